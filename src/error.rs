use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Database environment unavailable: {message}")]
    Environment { message: String },

    #[error("Source file not found: {path}")]
    SourceNotFound { path: String },

    #[error("Unsupported source file: {path}")]
    UnsupportedSource { path: String },

    #[error("Failed to connect to {path}: {message}")]
    Connection { path: String, message: String },

    #[error("Catalog read failed: {0}")]
    CatalogRead(String),

    #[error("Query failed for table {table}: {message}")]
    Query { table: String, message: String },

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report file error: {message}")]
    Report { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

/// Coarse error classes used for run outcomes, reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Environment,
    Input,
    Connection,
    CatalogRead,
    Query,
    Io,
    Report,
    Config,
    Cancelled,
}

impl ExportError {
    pub fn query(table: impl Into<String>, message: impl Into<String>) -> Self {
        ExportError::Query {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn connection(path: impl Into<String>, message: impl Into<String>) -> Self {
        ExportError::Connection {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ExportError::Environment { .. } => ErrorCategory::Environment,
            ExportError::SourceNotFound { .. } | ExportError::UnsupportedSource { .. } => {
                ErrorCategory::Input
            }
            ExportError::Connection { .. } => ErrorCategory::Connection,
            ExportError::CatalogRead(_) => ErrorCategory::CatalogRead,
            ExportError::Query { .. } => ErrorCategory::Query,
            ExportError::Csv(_) | ExportError::Io(_) => ErrorCategory::Io,
            ExportError::Report { .. } => ErrorCategory::Report,
            ExportError::Config { .. } => ErrorCategory::Config,
            ExportError::Cancelled => ErrorCategory::Cancelled,
        }
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExportError {
    fn user_message(&self) -> String {
        match self {
            ExportError::Environment { message } => {
                format!("The database driver environment is not available: {}", message)
            }
            ExportError::SourceNotFound { path } => {
                format!("File not found: {}", path)
            }
            ExportError::UnsupportedSource { path } => {
                format!("Unsupported file type: {}", path)
            }
            ExportError::Connection { message, .. } => {
                format!(
                    "Failed to connect to the database.\n\
                     The Microsoft Access Database Engine (ODBC driver) may not be installed.\n\
                     Details: {}",
                    message
                )
            }
            ExportError::Query { table, message } => {
                format!(
                    "A data source error occurred while exporting table {}.\nDetails: {}",
                    table, message
                )
            }
            ExportError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ExportError::Cancelled => "Operation was cancelled by user".to_string(),
            _ => format!("An error occurred during export.\nDetails: {}", self),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExportError::Environment { .. } => Some(
                "Install the Microsoft Access Database Engine and rebuild mdb2csv with `--features odbc`.".to_string()
            ),
            ExportError::SourceNotFound { .. } => Some(
                "Check the path and make sure the database file exists.".to_string()
            ),
            ExportError::UnsupportedSource { .. } => Some(
                "Only Access database files are supported. Add the extension to [source].extensions in the configuration to allow others.".to_string()
            ),
            ExportError::Connection { .. } => Some(
                "Verify the file is a valid Access database that is not locked by another program, and that the configured ODBC driver name matches an installed driver.".to_string()
            ),
            ExportError::Config { .. } => Some(
                "Check your configuration file syntax and ensure all required fields are present.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ExportError {
    fn from(error: toml::de::Error) -> Self {
        ExportError::Config {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(error: serde_json::Error) -> Self {
        ExportError::Report {
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
