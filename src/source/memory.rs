use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use super::{CatalogObject, Connector, DataSource, IndexColumn, PrimaryKeyColumn, RowSink};
use crate::error::{ExportError, Result};
use crate::export::query::SelectQuery;

/// A table held in memory, together with the metadata a driver would report for it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub primary_keys: Vec<PrimaryKeyColumn>,
    pub indexes: Vec<IndexColumn>,
    pub fail_primary_keys: bool,
    pub fail_indexes: bool,
    pub fail_columns: bool,
    pub fail_query: bool,
    /// Fail the query after this many rows have been streamed.
    pub fail_after_rows: Option<usize>,
}

impl MemoryTable {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_row(mut self, values: &[Option<&str>]) -> Self {
        self.rows
            .push(values.iter().map(|v| v.map(str::to_string)).collect());
        self
    }

    /// Declare primary key columns as `(column, key_seq)` pairs.
    pub fn with_primary_key(mut self, columns: &[(&str, &str)]) -> Self {
        for (column, seq) in columns {
            self.primary_keys.push(PrimaryKeyColumn {
                column_name: Some(column.to_string()),
                key_seq: Some(seq.to_string()),
            });
        }
        self
    }

    /// Declare a unique index as `(column, ordinal_position)` pairs.
    pub fn with_unique_index(mut self, name: &str, columns: &[(&str, &str)]) -> Self {
        for (column, ordinal) in columns {
            self.indexes.push(IndexColumn {
                index_name: Some(name.to_string()),
                column_name: Some(column.to_string()),
                ordinal_position: Some(ordinal.to_string()),
                non_unique: Some("0".to_string()),
            });
        }
        self
    }

    pub fn with_index_row(mut self, row: IndexColumn) -> Self {
        self.indexes.push(row);
        self
    }

    pub fn failing_primary_keys(mut self) -> Self {
        self.fail_primary_keys = true;
        self
    }

    pub fn failing_indexes(mut self) -> Self {
        self.fail_indexes = true;
        self
    }

    pub fn failing_columns(mut self) -> Self {
        self.fail_columns = true;
        self
    }

    pub fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub fn failing_after_rows(mut self, rows: usize) -> Self {
        self.fail_after_rows = Some(rows);
        self
    }
}

/// In-memory [`DataSource`].
///
/// Index rows are reported exactly as configured, whatever `unique_only` says,
/// which mimics drivers that ignore the unique filter. Every executed query is
/// recorded in a log shared by all clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Vec<MemoryTable>,
    catalog: Vec<CatalogObject>,
    fail_catalog: bool,
    listed_tables: Option<Vec<String>>,
    fail_table_listing: bool,
    query_log: Rc<RefCell<Vec<String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table and register it in the catalog as a local table.
    pub fn with_table(mut self, table: MemoryTable) -> Self {
        let id = self.next_catalog_id();
        self.catalog.push(CatalogObject {
            name: table.name.clone(),
            object_type: 1,
            id,
        });
        self.tables.push(table);
        self
    }

    /// Add a raw catalog entry without table data (system objects, queries, forms).
    pub fn with_catalog_object(mut self, name: &str, object_type: i32, id: i64) -> Self {
        self.catalog.push(CatalogObject {
            name: name.to_string(),
            object_type,
            id,
        });
        self
    }

    /// Make reads of the catalog object registry fail, as they do without read permission.
    pub fn failing_catalog(mut self) -> Self {
        self.fail_catalog = true;
        self
    }

    /// Override what the generic table listing returns. Defaults to the table names.
    pub fn with_listed_tables(mut self, names: &[&str]) -> Self {
        self.listed_tables = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn failing_table_listing(mut self) -> Self {
        self.fail_table_listing = true;
        self
    }

    /// SQL text of every query executed so far, across all clones.
    pub fn executed_queries(&self) -> Vec<String> {
        self.query_log.borrow().clone()
    }

    fn next_catalog_id(&self) -> i64 {
        self.catalog.iter().map(|o| o.id).max().unwrap_or(0) + 1
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ExportError::CatalogRead(format!("table not found: {}", name)))
    }
}

impl DataSource for MemorySource {
    fn list_catalog_objects(&self) -> Result<Vec<CatalogObject>> {
        if self.fail_catalog {
            return Err(ExportError::CatalogRead(
                "no read permission on MSysObjects".to_string(),
            ));
        }
        Ok(self.catalog.clone())
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        if self.fail_table_listing {
            return Err(ExportError::CatalogRead("table listing failed".to_string()));
        }
        Ok(match &self.listed_tables {
            Some(names) => names.clone(),
            None => self.tables.iter().map(|t| t.name.clone()).collect(),
        })
    }

    fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let table = self.table(table)?;
        if table.fail_columns {
            return Err(ExportError::CatalogRead(format!(
                "column listing failed for {}",
                table.name
            )));
        }
        Ok(table.columns.clone())
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<PrimaryKeyColumn>> {
        let table = self.table(table)?;
        if table.fail_primary_keys {
            return Err(ExportError::CatalogRead(format!(
                "primary key listing not supported for {}",
                table.name
            )));
        }
        Ok(table.primary_keys.clone())
    }

    fn list_indexes(&self, table: &str, _unique_only: bool) -> Result<Vec<IndexColumn>> {
        let table = self.table(table)?;
        if table.fail_indexes {
            return Err(ExportError::CatalogRead(format!(
                "index statistics failed for {}",
                table.name
            )));
        }
        Ok(table.indexes.clone())
    }

    fn execute(&self, query: &SelectQuery, sink: &mut dyn RowSink) -> Result<u64> {
        let sql = query.to_sql();
        self.query_log.borrow_mut().push(sql.clone());
        debug!("memory source executing: {}", sql);

        let table = self
            .table(&query.table)
            .map_err(|e| ExportError::query(&query.table, e.to_string()))?;
        if table.fail_query {
            return Err(ExportError::query(&table.name, "simulated driver failure"));
        }

        let mut order_indices = Vec::with_capacity(query.order_by.len());
        for column in &query.order_by {
            let index = table
                .columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(column))
                .ok_or_else(|| {
                    ExportError::query(&table.name, format!("unknown column in ORDER BY: {}", column))
                })?;
            order_indices.push(index);
        }

        let mut rows: Vec<&Vec<Option<String>>> = table.rows.iter().collect();
        rows.sort_by(|a, b| {
            order_indices
                .iter()
                .map(|&i| a.get(i).cmp(&b.get(i)))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        sink.write_header(&table.columns)?;
        for (streamed, row) in rows.iter().enumerate() {
            if table.fail_after_rows == Some(streamed) {
                return Err(ExportError::query(&table.name, "connection lost while fetching"));
            }
            sink.write_row(row)?;
        }
        if table.fail_after_rows.is_some_and(|limit| limit >= rows.len()) {
            return Err(ExportError::query(&table.name, "connection lost while fetching"));
        }
        Ok(rows.len() as u64)
    }
}

/// Hands out [`MemorySource`]s registered per path.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    sources: HashMap<PathBuf, MemorySource>,
    no_index_statistics: bool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>, source: MemorySource) -> Self {
        self.sources.insert(path.into(), source);
        self
    }

    /// Behave like a backend that cannot read index statistics: every index
    /// lookup fails and the connector says so.
    pub fn without_index_statistics(mut self) -> Self {
        self.no_index_statistics = true;
        self
    }
}

impl Connector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_index_statistics(&self) -> bool {
        !self.no_index_statistics
    }

    fn open(&self, path: &Path) -> Result<Box<dyn DataSource>> {
        match self.sources.get(path) {
            Some(source) if self.no_index_statistics => {
                let mut source = source.clone();
                for table in &mut source.tables {
                    table.fail_indexes = true;
                }
                Ok(Box::new(source))
            }
            Some(source) => Ok(Box::new(source.clone())),
            None => Err(ExportError::connection(
                path.display().to_string(),
                "no database registered for this path",
            )),
        }
    }
}
