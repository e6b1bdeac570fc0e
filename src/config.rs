use crate::error::{ExportError, Result};
use crate::export::MIN_NAME_LENGTH;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILES: &[&str] = &["mdb2csv.toml", ".mdb2csv.toml"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub export: ExportConfig,
    pub source: SourceConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    pub max_name_length: usize,
    pub default_table_name: String,
    pub file_extension: String,
    pub warning_list_limit: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    pub driver: String,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub max_depth: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub file_suffix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_name_length: 120,
            default_table_name: "table".to_string(),
            file_extension: "csv".to_string(),
            warning_list_limit: 5,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            driver: "Microsoft Access Driver (*.mdb, *.accdb)".to_string(),
            extensions: vec!["mdb".to_string()],
            recursive: false,
            max_depth: 10,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file_suffix: "_report".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExportError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExportError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| ExportError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Load `config_path`, else the first default file in the working directory, else defaults.
    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                for default_path in DEFAULT_CONFIG_FILES {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }
                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(report) = cli_args.report {
            self.report.enabled = report;
        }

        if let Some(max_name_length) = cli_args.max_name_length {
            self.export.max_name_length = max_name_length;
        }

        if let Some(recursive) = cli_args.recursive {
            self.source.recursive = recursive;
        }

        if let Some(ref driver) = cli_args.driver {
            self.source.driver = driver.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.export.max_name_length < MIN_NAME_LENGTH {
            return Err(ExportError::Config {
                message: format!(
                    "Maximum name length must be at least {}, got {}",
                    MIN_NAME_LENGTH, self.export.max_name_length
                ),
            });
        }

        let default_name = &self.export.default_table_name;
        if default_name.trim().is_empty() {
            return Err(config_error("Default table name must not be empty"));
        }
        if default_name.chars().count() > self.export.max_name_length {
            return Err(ExportError::Config {
                message: format!(
                    "Default table name '{}' is longer than the maximum name length {}",
                    default_name, self.export.max_name_length
                ),
            });
        }

        if self.export.warning_list_limit == 0 {
            return Err(config_error("Warning list limit must be greater than 0"));
        }

        let extension_pattern = Regex::new(r"^[A-Za-z0-9_]+$").map_err(|e| ExportError::Config {
            message: format!("Invalid extension pattern: {}", e),
        })?;
        if !extension_pattern.is_match(&self.export.file_extension) {
            return Err(ExportError::Config {
                message: format!(
                    "Output file extension must be alphanumeric, got '{}'",
                    self.export.file_extension
                ),
            });
        }

        if self.source.extensions.is_empty() {
            return Err(config_error("At least one source file extension must be specified"));
        }

        if self.source.driver.trim().is_empty() {
            return Err(config_error("ODBC driver name must not be empty"));
        }

        if self.source.max_depth == 0 {
            return Err(config_error("Maximum directory depth must be greater than 0"));
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

fn config_error(message: &str) -> ExportError {
    ExportError::Config {
        message: message.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub report: Option<bool>,
    pub max_name_length: Option<usize>,
    pub recursive: Option<bool>,
    pub driver: Option<String>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report(mut self, report: Option<bool>) -> Self {
        self.report = report;
        self
    }

    pub fn with_max_name_length(mut self, max_name_length: Option<usize>) -> Self {
        self.max_name_length = max_name_length;
        self
    }

    pub fn with_recursive(mut self, recursive: Option<bool>) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_driver(mut self, driver: Option<String>) -> Self {
        self.driver = driver;
        self
    }
}
