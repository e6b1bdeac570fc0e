//! Data source abstraction for Access databases.
//!
//! The export pipeline never talks to a driver directly. It reads catalog
//! metadata and ordered rows through [`DataSource`], which is opened for a
//! given file by a [`Connector`].
//!
//! - [`memory`]: in-process tables, used by tests and dry runs of the pipeline
//! - `odbc` (feature `odbc`): the Microsoft Access ODBC driver

pub mod memory;
#[cfg(feature = "odbc")]
pub mod odbc;

use std::path::Path;

use crate::config::SourceConfig;
use crate::error::{ExportError, Result};
use crate::export::query::SelectQuery;

pub use memory::{MemoryConnector, MemorySource, MemoryTable};

/// One entry of the catalog object registry (`MSysObjects`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogObject {
    pub name: String,
    pub object_type: i32,
    pub id: i64,
}

/// One column of a declared primary key.
///
/// `key_seq` is kept as raw text; the sort key cascade parses it leniently.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrimaryKeyColumn {
    pub column_name: Option<String>,
    pub key_seq: Option<String>,
}

/// One row of index statistics for a table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexColumn {
    pub index_name: Option<String>,
    pub column_name: Option<String>,
    pub ordinal_position: Option<String>,
    /// Raw non-unique flag as reported by the driver (`"0"`, `"1"`, `"false"`, ...).
    pub non_unique: Option<String>,
}

/// Receives the result set of a [`SelectQuery`].
pub trait RowSink {
    /// Called exactly once, before any row.
    fn write_header(&mut self, columns: &[String]) -> Result<()>;

    /// `None` marks a NULL value.
    fn write_row(&mut self, values: &[Option<String>]) -> Result<()>;
}

/// Read access to one open database.
///
/// Every method maps driver failures to [`ExportError`]. Catalog reads use
/// [`ExportError::CatalogRead`] so callers can fall back; row streaming uses
/// [`ExportError::Query`].
pub trait DataSource {
    /// Entries of the catalog object registry, in any order.
    fn list_catalog_objects(&self) -> Result<Vec<CatalogObject>>;

    /// Names from the driver's generic table listing (table type `TABLE`).
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Column names of `table` in declared order.
    fn list_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Declared primary key columns of `table`.
    fn list_primary_keys(&self, table: &str) -> Result<Vec<PrimaryKeyColumn>>;

    /// Index statistics of `table`, restricted to unique indexes when `unique_only` is set.
    fn list_indexes(&self, table: &str, unique_only: bool) -> Result<Vec<IndexColumn>>;

    /// Run `query` and stream its header and rows into `sink`. Returns the row count.
    fn execute(&self, query: &SelectQuery, sink: &mut dyn RowSink) -> Result<u64>;
}

/// Opens a [`DataSource`] for a database file.
pub trait Connector {
    /// Human readable name of the backend, used in logs and dry-run output.
    fn name(&self) -> &str;

    fn open(&self, path: &Path) -> Result<Box<dyn DataSource>>;

    /// Whether [`DataSource::list_indexes`] can answer on this backend. Without
    /// it the sort key cascade never reaches the unique index tier.
    fn supports_index_statistics(&self) -> bool {
        true
    }
}

/// Build the connector for this binary.
///
/// Fails with [`ExportError::Environment`] when no driver backend is available,
/// so callers can report it once before processing any file.
#[cfg(feature = "odbc")]
pub fn default_connector(config: &SourceConfig) -> Result<Box<dyn Connector>> {
    let connector = odbc::OdbcConnector::new(&config.driver)?;
    Ok(Box::new(connector))
}

#[cfg(not(feature = "odbc"))]
pub fn default_connector(config: &SourceConfig) -> Result<Box<dyn Connector>> {
    Err(ExportError::Environment {
        message: format!(
            "mdb2csv was built without the `odbc` feature, so the driver '{}' cannot be used",
            config.driver
        ),
    })
}
