//! Microsoft Access backend over ODBC.
//!
//! Requires an ODBC driver manager and the Access Database Engine driver
//! (`Microsoft Access Driver (*.mdb, *.accdb)`).

use std::path::Path;
use std::sync::OnceLock;

use odbc_api::buffers::{AnySlice, BufferDesc, ColumnarAnyBuffer};
use odbc_api::{Connection, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use tracing::{debug, info};

use super::{CatalogObject, Connector, DataSource, IndexColumn, PrimaryKeyColumn, RowSink};
use crate::error::{ExportError, Result};
use crate::export::query::SelectQuery;

const CATALOG_BATCH_SIZE: usize = 1000;
const CATALOG_TEXT_LENGTH: usize = 4096;
const DATA_BATCH_SIZE: usize = 256;
/// Longest value a data cell may hold, in UTF-16 units. Longer values fail the table.
const MAX_TEXT_LENGTH: usize = 65536;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| ExportError::Environment {
        message: format!("failed to create ODBC environment: {}", e),
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// Opens Access files through the configured ODBC driver.
pub struct OdbcConnector {
    env: &'static Environment,
    driver: String,
}

impl OdbcConnector {
    /// Create the connector, checking that the driver is installed.
    pub fn new(driver: &str) -> Result<Self> {
        let env = environment()?;
        let drivers = env.drivers().map_err(|e| ExportError::Environment {
            message: format!("failed to list ODBC drivers: {}", e),
        })?;

        if !drivers.iter().any(|d| d.description == driver) {
            return Err(ExportError::Environment {
                message: format!(
                    "ODBC driver '{}' is not installed (found: {})",
                    driver,
                    drivers
                        .iter()
                        .map(|d| d.description.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            });
        }

        debug!("using ODBC driver '{}'", driver);
        Ok(Self {
            env,
            driver: driver.to_string(),
        })
    }

    fn connection_string(&self, path: &Path) -> String {
        format!("DRIVER={{{}}};DBQ={};", self.driver, path.display())
    }
}

impl Connector for OdbcConnector {
    fn name(&self) -> &str {
        &self.driver
    }

    fn open(&self, path: &Path) -> Result<Box<dyn DataSource>> {
        let connection = self
            .env
            .connect_with_connection_string(&self.connection_string(path), ConnectionOptions::default())
            .map_err(|e| ExportError::connection(path.display().to_string(), e.to_string()))?;
        info!("connected to {} via ODBC", path.display());
        Ok(Box::new(OdbcSource { connection }))
    }

    fn supports_index_statistics(&self) -> bool {
        false
    }
}

/// One open Access database.
pub struct OdbcSource {
    connection: Connection<'static>,
}

/// Bind every result column as UTF-16 text, so values arrive in the driver's
/// own encoding whatever the client code page is.
fn wide_text_buffer(
    cursor: &mut impl ResultSetMetadata,
    batch_size: usize,
    max_str_len: usize,
) -> std::result::Result<ColumnarAnyBuffer, odbc_api::Error> {
    let num_cols = cursor.num_result_cols()? as u16;
    let mut descs = Vec::with_capacity(num_cols as usize);
    for col in 1..=num_cols {
        let len = cursor
            .col_data_type(col)?
            .utf16_len()
            .map_or(max_str_len, |len| len.get().min(max_str_len));
        descs.push(BufferDesc::WText { max_str_len: len });
    }
    ColumnarAnyBuffer::try_from_descs(batch_size, descs)
}

fn decode_row(batch: &ColumnarAnyBuffer, row_idx: usize, values: &mut Vec<Option<String>>) {
    values.clear();
    values.extend((0..batch.num_cols()).map(|col_idx| match batch.column(col_idx) {
        AnySlice::WText(view) => view.get(row_idx).map(String::from_utf16_lossy),
        _ => None,
    }));
}

/// Drain a cursor into text rows. A value that does not fit its buffer is an error.
fn collect_rows(mut cursor: impl Cursor) -> std::result::Result<Vec<Vec<Option<String>>>, odbc_api::Error> {
    let mut buffers = wide_text_buffer(&mut cursor, CATALOG_BATCH_SIZE, CATALOG_TEXT_LENGTH)?;
    let mut row_cursor = cursor.bind_buffer(&mut buffers)?;

    let mut rows = Vec::new();
    while let Some(batch) = row_cursor.fetch_with_truncation_check(true)? {
        for row_idx in 0..batch.num_rows() {
            let mut row = Vec::with_capacity(batch.num_cols());
            decode_row(batch, row_idx, &mut row);
            rows.push(row);
        }
    }
    Ok(rows)
}

fn catalog_error(what: &str, error: odbc_api::Error) -> ExportError {
    ExportError::CatalogRead(format!("{}: {}", what, error))
}

fn cell(row: &[Option<String>], index: usize) -> Option<String> {
    row.get(index).cloned().flatten()
}

impl OdbcSource {
    fn query_text(&self, sql: &str) -> Result<Vec<Vec<Option<String>>>> {
        match self.connection.execute(sql, ()) {
            Ok(Some(cursor)) => collect_rows(cursor).map_err(|e| catalog_error(sql, e)),
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(catalog_error(sql, e)),
        }
    }
}

impl DataSource for OdbcSource {
    fn list_catalog_objects(&self) -> Result<Vec<CatalogObject>> {
        let rows = self.query_text("SELECT Name, Type, Id FROM MSysObjects")?;
        let objects = rows
            .iter()
            .filter_map(|row| {
                let name = cell(row, 0)?;
                let object_type = cell(row, 1)?.trim().parse().ok()?;
                let id = cell(row, 2)?.trim().parse().ok()?;
                Some(CatalogObject {
                    name,
                    object_type,
                    id,
                })
            })
            .collect();
        Ok(objects)
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let cursor = self
            .connection
            .tables("", "", "", "TABLE")
            .map_err(|e| catalog_error("SQLTables", e))?;
        let rows = collect_rows(cursor).map_err(|e| catalog_error("SQLTables", e))?;
        Ok(rows.iter().filter_map(|row| cell(row, 2)).collect())
    }

    fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let cursor = self
            .connection
            .columns("", "", table, "")
            .map_err(|e| catalog_error("SQLColumns", e))?;
        let rows = collect_rows(cursor).map_err(|e| catalog_error("SQLColumns", e))?;
        Ok(rows.iter().filter_map(|row| cell(row, 3)).collect())
    }

    fn list_primary_keys(&self, table: &str) -> Result<Vec<PrimaryKeyColumn>> {
        let cursor = self
            .connection
            .primary_keys(None, None, table)
            .map_err(|e| catalog_error("SQLPrimaryKeys", e))?;
        let rows = collect_rows(cursor).map_err(|e| catalog_error("SQLPrimaryKeys", e))?;
        Ok(rows
            .iter()
            .map(|row| PrimaryKeyColumn {
                column_name: cell(row, 3),
                key_seq: cell(row, 4),
            })
            .collect())
    }

    fn list_indexes(&self, table: &str, _unique_only: bool) -> Result<Vec<IndexColumn>> {
        // SQLStatistics is not exposed by odbc-api; the cascade falls through to the first column.
        Err(ExportError::CatalogRead(format!(
            "index statistics are not available over ODBC for {}",
            table
        )))
    }

    fn execute(&self, query: &SelectQuery, sink: &mut dyn RowSink) -> Result<u64> {
        let sql = query.to_sql();
        debug!("executing: {}", sql);
        let query_error = |e: odbc_api::Error| ExportError::query(&query.table, e.to_string());

        let Some(mut cursor) = self.connection.execute(&sql, ()).map_err(query_error)? else {
            return Ok(0);
        };

        let header = cursor
            .column_names()
            .map_err(query_error)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(query_error)?;
        sink.write_header(&header)?;

        let mut buffers =
            wide_text_buffer(&mut cursor, DATA_BATCH_SIZE, MAX_TEXT_LENGTH).map_err(query_error)?;
        let mut row_cursor = cursor.bind_buffer(&mut buffers).map_err(query_error)?;

        let mut count = 0u64;
        let mut values = Vec::with_capacity(header.len());
        while let Some(batch) = row_cursor
            .fetch_with_truncation_check(true)
            .map_err(query_error)?
        {
            for row_idx in 0..batch.num_rows() {
                decode_row(batch, row_idx, &mut values);
                sink.write_row(&values)?;
                count += 1;
            }
        }
        Ok(count)
    }
}
