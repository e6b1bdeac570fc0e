use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::enumerator::list_user_tables;
use super::naming::UniqueNameAllocator;
use super::query::SelectQuery;
use super::sort_key::{resolve_order_columns, SortKeyTier};
use super::writer::CsvTableWriter;
use crate::config::{Config, ExportConfig};
use crate::error::{ErrorCategory, ExportError, Result, UserFriendlyError};
use crate::report::build_warning_messages;
use crate::source::{Connector, DataSource};

/// Settings one export run needs, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub export: ExportConfig,
    pub extensions: Vec<String>,
}

impl ExportContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            export: config.export.clone(),
            extensions: config.source.extensions.clone(),
        }
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }
}

impl Default for ExportContext {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything decided about one table before its rows are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub raw_name: String,
    pub sanitized_name: String,
    pub order_columns: Vec<String>,
    pub sort_key_tier: SortKeyTier,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    NoTables,
    Failed(ErrorCategory),
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::NoTables => "no_tables",
            RunStatus::Failed(_) => "failed",
        }
    }
}

/// Outcome of exporting one source file.
#[derive(Debug, Clone)]
pub struct ExportRunResult {
    pub succeeded: bool,
    pub status: RunStatus,
    pub source_path: PathBuf,
    pub output_directory: PathBuf,
    pub exported_count: usize,
    pub exported_files: Vec<String>,
    pub tables_sorted_by_first_column: Vec<String>,
    pub tables_without_sort_key: Vec<String>,
    /// Outcome line plus shortened warnings, for display.
    pub message: String,
    /// Outcome line plus complete warnings, for the run log.
    pub report_message: String,
    pub warning_messages: Vec<String>,
    pub tables: Vec<TableDescriptor>,
}

impl ExportRunResult {
    /// An empty, unsuccessful result for `source_path`.
    pub fn new(source_path: &Path) -> Self {
        Self {
            succeeded: false,
            status: RunStatus::NoTables,
            source_path: source_path.to_path_buf(),
            output_directory: output_directory_for(source_path),
            exported_count: 0,
            exported_files: Vec::new(),
            tables_sorted_by_first_column: Vec::new(),
            tables_without_sort_key: Vec::new(),
            message: String::new(),
            report_message: String::new(),
            warning_messages: Vec::new(),
            tables: Vec::new(),
        }
    }

    fn record_table(&mut self, descriptor: TableDescriptor) {
        match descriptor.sort_key_tier {
            SortKeyTier::FirstColumn => self
                .tables_sorted_by_first_column
                .push(descriptor.raw_name.clone()),
            SortKeyTier::None => self.tables_without_sort_key.push(descriptor.raw_name.clone()),
            SortKeyTier::PrimaryKey | SortKeyTier::UniqueIndex => {}
        }
        self.tables.push(descriptor);
    }

    fn fail(mut self, error: ExportError) -> Self {
        warn!("export of {} failed: {}", self.source_path.display(), error);
        self.succeeded = false;
        self.status = RunStatus::Failed(error.category());
        self.message = error.user_message();
        self.report_message = self.message.clone();
        self.warning_messages.clear();
        self
    }

    fn no_tables(mut self) -> Self {
        info!("no tables to export in {}", self.source_path.display());
        self.succeeded = false;
        self.status = RunStatus::NoTables;
        self.message = "No tables to export were found.".to_string();
        self.report_message = self.message.clone();
        self
    }

    fn complete(mut self, warning_list_limit: usize) -> Self {
        let base = format!(
            "Exported {} tables to CSV.\nOutput directory: {}",
            self.exported_count,
            self.output_directory.display()
        );
        let display_warnings = build_warning_messages(
            &self.tables_sorted_by_first_column,
            &self.tables_without_sort_key,
            Some(warning_list_limit),
        );
        self.warning_messages = build_warning_messages(
            &self.tables_sorted_by_first_column,
            &self.tables_without_sort_key,
            None,
        );
        self.message = join_paragraphs(&base, &display_warnings);
        self.report_message = join_paragraphs(&base, &self.warning_messages);
        self.succeeded = true;
        self.status = RunStatus::Success;
        info!(
            "exported {} tables from {}",
            self.exported_count,
            self.source_path.display()
        );
        self
    }

    pub fn has_warnings(&self) -> bool {
        !self.warning_messages.is_empty()
    }
}

fn join_paragraphs(base: &str, paragraphs: &[String]) -> String {
    let mut message = base.to_string();
    for paragraph in paragraphs {
        message.push_str("\n\n");
        message.push_str(paragraph);
    }
    message
}

/// `<source dir>/<source stem>`
pub fn output_directory_for(source_path: &Path) -> PathBuf {
    let stem = source_path.file_stem().unwrap_or_default();
    match source_path.parent() {
        Some(parent) => parent.join(stem),
        None => PathBuf::from(stem),
    }
}

/// Progress of one run, handed to the progress callback after each table.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    pub tables_done: usize,
    pub total_tables: usize,
    pub rows_written: u64,
    pub current_table: Option<String>,
}

impl ExportProgress {
    pub fn new(total_tables: usize) -> Self {
        Self {
            tables_done: 0,
            total_tables,
            rows_written: 0,
            current_table: None,
        }
    }

    fn table_done(&mut self, table: &str, rows: u64) {
        self.tables_done += 1;
        self.rows_written += rows;
        self.current_table = Some(table.to_string());
    }
}

/// What a run would do, without touching the file system.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPlan {
    pub source_path: PathBuf,
    pub output_directory: PathBuf,
    pub backend: String,
    /// False when the backend cannot read index statistics.
    pub index_statistics: bool,
    pub tables: Vec<TableDescriptor>,
}

/// Exports every user table of a database file to CSV.
pub struct TableExporter<'a> {
    connector: &'a dyn Connector,
    context: ExportContext,
}

impl<'a> TableExporter<'a> {
    pub fn new(connector: &'a dyn Connector, context: ExportContext) -> Self {
        Self { connector, context }
    }

    /// Export all user tables of `source_path`.
    ///
    /// Failures are reported through the returned result, never as `Err`. A
    /// failing table stops the run; files written before it stay on disk.
    pub fn run_export(
        &self,
        source_path: &Path,
        progress_callback: Option<&dyn Fn(&ExportProgress)>,
    ) -> ExportRunResult {
        info!("exporting {}", source_path.display());
        let mut result = ExportRunResult::new(source_path);

        if let Err(e) = self.validate_source(source_path) {
            return result.fail(e);
        }

        let source = match self.connector.open(source_path) {
            Ok(source) => source,
            Err(e) => return result.fail(e),
        };

        let tables = list_user_tables(source.as_ref());
        if tables.is_empty() {
            return result.no_tables();
        }
        debug!("{} tables to export", tables.len());

        if let Err(e) = fs::create_dir_all(&result.output_directory) {
            return result.fail(e.into());
        }

        let mut allocator = UniqueNameAllocator::from_config(&self.context.export);
        let mut progress = ExportProgress::new(tables.len());
        if let Some(callback) = progress_callback {
            callback(&progress);
        }

        for table in &tables {
            let descriptor =
                self.describe_table(source.as_ref(), &mut allocator, &result.output_directory, table);
            let file_name = descriptor
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            result.record_table(descriptor.clone());

            let rows = match export_table(source.as_ref(), &descriptor) {
                Ok(rows) => rows,
                Err(e) => return result.fail(e),
            };

            result.exported_files.push(file_name);
            result.exported_count += 1;
            progress.table_done(table, rows);
            if let Some(callback) = progress_callback {
                callback(&progress);
            }
        }

        result.complete(self.context.export.warning_list_limit)
    }

    /// Resolve tables, output names and sort keys without writing anything.
    pub fn plan_export(&self, source_path: &Path) -> Result<ExportPlan> {
        self.validate_source(source_path)?;
        let source = self.connector.open(source_path)?;
        let output_directory = output_directory_for(source_path);

        let mut allocator = UniqueNameAllocator::from_config(&self.context.export);
        let tables = list_user_tables(source.as_ref())
            .iter()
            .map(|table| self.describe_table(source.as_ref(), &mut allocator, &output_directory, table))
            .collect();

        Ok(ExportPlan {
            source_path: source_path.to_path_buf(),
            output_directory,
            backend: self.connector.name().to_string(),
            index_statistics: self.connector.supports_index_statistics(),
            tables,
        })
    }

    fn validate_source(&self, source_path: &Path) -> Result<()> {
        if !source_path.exists() {
            return Err(ExportError::SourceNotFound {
                path: source_path.display().to_string(),
            });
        }
        if !source_path.is_file() || !self.context.is_supported(source_path) {
            return Err(ExportError::UnsupportedSource {
                path: source_path.display().to_string(),
            });
        }
        Ok(())
    }

    fn describe_table(
        &self,
        source: &dyn DataSource,
        allocator: &mut UniqueNameAllocator,
        output_directory: &Path,
        table: &str,
    ) -> TableDescriptor {
        let output_path = allocator.allocate(output_directory, table);
        let sanitized_name = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let sort_key = resolve_order_columns(source, table);
        debug!(
            "{} -> {} ordered by {} {:?}",
            table,
            sanitized_name,
            sort_key.tier,
            sort_key.columns
        );

        TableDescriptor {
            raw_name: table.to_string(),
            sanitized_name,
            order_columns: sort_key.columns,
            sort_key_tier: sort_key.tier,
            output_path,
        }
    }
}

/// Stream one table into its CSV file. On failure the partly written file stays
/// on disk, flushed up to the last row received.
fn export_table(source: &dyn DataSource, descriptor: &TableDescriptor) -> Result<u64> {
    let query = SelectQuery::new(&descriptor.raw_name, descriptor.order_columns.clone());
    let mut writer = CsvTableWriter::create(&descriptor.output_path)?;

    let rows = source.execute(&query, &mut writer)?;
    writer.finish()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryConnector, MemorySource, MemoryTable};
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn setup(source: MemorySource) -> (TempDir, PathBuf, MemoryConnector) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("sales.mdb");
        fs::write(&db_path, b"").unwrap();
        let connector = MemoryConnector::new().with_source(db_path.clone(), source);
        (temp_dir, db_path, connector)
    }

    fn orders_and_lookup() -> MemorySource {
        MemorySource::new()
            .with_table(
                MemoryTable::new("Orders", &["OrderID", "Item"])
                    .with_primary_key(&[("OrderID", "1")])
                    .with_row(&[Some("2"), Some("Pen")])
                    .with_row(&[Some("1"), Some("Ink")]),
            )
            .with_catalog_object("~Temp~Log", 1, 10)
            .with_table(
                MemoryTable::new("Lookup", &["Code", "Name"])
                    .with_row(&[Some("B"), None])
                    .with_row(&[Some("A"), Some("Alpha")]),
            )
    }

    #[test]
    fn test_output_directory_for() {
        assert_eq!(
            output_directory_for(Path::new("/data/sales.mdb")),
            Path::new("/data/sales")
        );
    }

    #[test]
    fn test_successful_run() {
        let (_temp_dir, db_path, connector) = setup(orders_and_lookup());
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&db_path, None);

        assert!(result.succeeded);
        assert_eq!(result.status, RunStatus::Success);
        assert_eq!(result.exported_count, 2);
        assert_eq!(result.exported_files, vec!["Orders.csv", "Lookup.csv"]);
        assert_eq!(result.tables_sorted_by_first_column, vec!["Lookup"]);
        assert!(result.tables_without_sort_key.is_empty());
        assert!(result.message.starts_with("Exported 2 tables to CSV."));
        assert!(result.message.contains("Tables: Lookup"));

        let orders = fs::read(result.output_directory.join("Orders.csv")).unwrap();
        assert_eq!(orders, b"\xEF\xBB\xBFOrderID,Item\r\n1,Ink\r\n2,Pen\r\n");
        let lookup = fs::read(result.output_directory.join("Lookup.csv")).unwrap();
        assert_eq!(lookup, b"\xEF\xBB\xBFCode,Name\r\nA,Alpha\r\nB,\r\n");
    }

    #[test]
    fn test_progress_callback() {
        let (_temp_dir, db_path, connector) = setup(orders_and_lookup());
        let exporter = TableExporter::new(&connector, ExportContext::default());
        let seen = RefCell::new(Vec::new());
        let callback = |p: &ExportProgress| seen.borrow_mut().push((p.tables_done, p.total_tables));

        exporter.run_export(&db_path, Some(&callback));

        assert_eq!(*seen.borrow(), vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_missing_and_unsupported_sources() {
        let (temp_dir, _db_path, connector) = setup(orders_and_lookup());
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let missing = exporter.run_export(&temp_dir.path().join("nope.mdb"), None);
        assert_eq!(missing.status, RunStatus::Failed(ErrorCategory::Input));
        assert!(missing.message.contains("nope.mdb"));

        let text = temp_dir.path().join("notes.txt");
        fs::write(&text, "x").unwrap();
        let unsupported = exporter.run_export(&text, None);
        assert_eq!(unsupported.status, RunStatus::Failed(ErrorCategory::Input));
        assert!(!temp_dir.path().join("notes").exists());
    }

    #[test]
    fn test_connection_failure_creates_nothing() {
        let (temp_dir, _db_path, connector) = setup(orders_and_lookup());
        let other = temp_dir.path().join("other.MDB");
        fs::write(&other, b"").unwrap();
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&other, None);

        assert_eq!(result.status, RunStatus::Failed(ErrorCategory::Connection));
        assert!(result.message.contains("ODBC driver"));
        assert!(!result.output_directory.exists());
    }

    #[test]
    fn test_no_tables() {
        let (_temp_dir, db_path, connector) =
            setup(MemorySource::new().with_catalog_object("MSysObjects", 1, 1));
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&db_path, None);

        assert!(!result.succeeded);
        assert_eq!(result.status, RunStatus::NoTables);
        assert_eq!(result.exported_count, 0);
        assert!(!result.output_directory.exists());
    }

    #[test]
    fn test_failure_midway_keeps_earlier_files() {
        let mut source = MemorySource::new();
        for i in 1..=5 {
            let mut table = MemoryTable::new(format!("T{}", i), &["id"]).with_row(&[Some("1")]);
            if i == 3 {
                table = table.failing_query();
            }
            source = source.with_table(table);
        }
        let (_temp_dir, db_path, connector) = setup(source);
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&db_path, None);

        assert!(!result.succeeded);
        assert_eq!(result.status, RunStatus::Failed(ErrorCategory::Query));
        assert_eq!(result.exported_count, 2);
        assert_eq!(result.exported_files, vec!["T1.csv", "T2.csv"]);
        assert!(result.warning_messages.is_empty());
        assert!(result.output_directory.join("T2.csv").exists());
        assert!(result.output_directory.join("T3.csv").exists());
        assert!(!result.output_directory.join("T4.csv").exists());
    }

    #[test]
    fn test_partial_table_output_is_kept() {
        let source = MemorySource::new()
            .with_table(MemoryTable::new("Small", &["id"]).with_row(&[Some("1")]))
            .with_table(
                MemoryTable::new("Big", &["id", "note"])
                    .with_row(&[Some("1"), Some("first")])
                    .with_row(&[Some("2"), Some("second")])
                    .failing_after_rows(1),
            );
        let (_temp_dir, db_path, connector) = setup(source);
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&db_path, None);

        assert!(!result.succeeded);
        assert_eq!(result.status, RunStatus::Failed(ErrorCategory::Query));
        assert_eq!(result.exported_files, vec!["Small.csv"]);

        let partial = fs::read(result.output_directory.join("Big.csv")).unwrap();
        assert_eq!(partial, b"\xEF\xBB\xBFid,note\r\n1,first\r\n");
    }

    #[test]
    fn test_colliding_names_and_queries() {
        let source = MemorySource::new()
            .with_table(MemoryTable::new("a/b", &["x"]).with_unique_index("ux", &[("x", "1")]))
            .with_table(MemoryTable::new("a_b", &[]));
        let queries = source.clone();
        let (_temp_dir, db_path, connector) = setup(source);
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&db_path, None);

        assert_eq!(result.exported_files, vec!["a_b.csv", "a_b_1.csv"]);
        assert_eq!(result.tables_without_sort_key, vec!["a_b"]);
        assert!(result.tables_sorted_by_first_column.is_empty());
        assert_eq!(
            queries.executed_queries(),
            vec!["SELECT * FROM [a/b] ORDER BY [x]", "SELECT * FROM [a_b]"]
        );
    }

    #[test]
    fn test_display_message_truncates_warnings() {
        let mut source = MemorySource::new();
        for i in 1..=7 {
            source = source.with_table(MemoryTable::new(format!("T{}", i), &["c"]));
        }
        let (_temp_dir, db_path, connector) = setup(source);
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let result = exporter.run_export(&db_path, None);

        assert!(result.message.ends_with("T1, T2, T3, T4, T5 ..."));
        assert!(result.report_message.ends_with("T5, T6, T7"));
        assert!(result.has_warnings());
    }

    #[test]
    fn test_plan_writes_nothing() {
        let (_temp_dir, db_path, connector) = setup(orders_and_lookup());
        let exporter = TableExporter::new(&connector, ExportContext::default());

        let plan = exporter.plan_export(&db_path).unwrap();

        assert_eq!(plan.backend, "memory");
        assert_eq!(plan.tables.len(), 2);
        assert_eq!(plan.tables[0].sort_key_tier, SortKeyTier::PrimaryKey);
        assert_eq!(plan.tables[1].order_columns, vec!["Code"]);
        assert!(plan.index_statistics);
        assert!(!plan.output_directory.exists());
    }

    #[test]
    fn test_plan_without_index_statistics() {
        let source = MemorySource::new().with_table(
            MemoryTable::new("Codes", &["Label", "Code"])
                .with_unique_index("UX_Code", &[("Code", "1")]),
        );
        let (_temp_dir, db_path, connector) = setup(source);
        let exporter = TableExporter::new(&connector, ExportContext::default());
        assert_eq!(
            exporter.plan_export(&db_path).unwrap().tables[0].sort_key_tier,
            SortKeyTier::UniqueIndex
        );

        let connector = connector.without_index_statistics();
        let exporter = TableExporter::new(&connector, ExportContext::default());
        let plan = exporter.plan_export(&db_path).unwrap();

        assert!(!plan.index_statistics);
        assert_eq!(plan.tables[0].sort_key_tier, SortKeyTier::FirstColumn);
        assert_eq!(plan.tables[0].order_columns, vec!["Label"]);
        assert_eq!(serde_json::to_value(&plan).unwrap()["index_statistics"], false);
    }
}
