pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod report;
pub mod scanner;
pub mod source;
pub mod ui;

// Public API re-exports
pub use cli::{Cli, OutputFormat};
pub use config::{CliOverrides, Config, ExportConfig, ReportConfig, SourceConfig};
pub use error::{ErrorCategory, ExportError, Result, UserFriendlyError};

// Core functionality re-exports
pub use export::{
    ExportContext, ExportPlan, ExportProgress, ExportRunResult, RunStatus, SortKey, SortKeyTier,
    TableDescriptor, TableExporter,
};
pub use report::{append_report, build_warning_messages, RunLogRecord};
pub use scanner::SourceScanner;
pub use source::{Connector, DataSource};
pub use ui::{GracefulShutdown, OutputFormatter, OutputMode, ProgressManager};

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

/// Outcome of one database file: the run itself and what happened to its report.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub result: ExportRunResult,
    pub report_path: Option<PathBuf>,
    pub report_error: Option<String>,
}

/// Main library interface for mdb2csv
pub struct Mdb2Csv {
    config: Config,
    connector: Box<dyn Connector>,
    output_formatter: OutputFormatter,
    progress_manager: ProgressManager,
    shutdown: GracefulShutdown,
}

impl Mdb2Csv {
    /// Create an instance backed by the driver this binary was built with.
    ///
    /// Fails with [`ExportError::Environment`] when that driver is unavailable.
    pub fn new(config: Config, output_mode: OutputMode, verbose: u8, quiet: bool) -> Result<Self> {
        let connector = source::default_connector(&config.source)?;
        let shutdown = GracefulShutdown::new()?;
        Ok(Self::assemble(config, connector, output_mode, verbose, quiet, shutdown))
    }

    /// Create an instance with an explicit connector.
    ///
    /// Ctrl+C handling is installed when possible; an already registered
    /// handler is not an error.
    pub fn with_connector(
        config: Config,
        connector: Box<dyn Connector>,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        Self::assemble(config, connector, output_mode, verbose, quiet, GracefulShutdown::install_or_detached())
    }

    /// Create an instance for testing (no signal handler)
    #[cfg(test)]
    pub fn new_for_test(config: Config, connector: Box<dyn Connector>) -> Self {
        Self::assemble(
            config,
            connector,
            OutputMode::Plain,
            0,
            true,
            GracefulShutdown::detached(),
        )
    }

    fn assemble(
        config: Config,
        connector: Box<dyn Connector>,
        output_mode: OutputMode,
        verbose: u8,
        quiet: bool,
        shutdown: GracefulShutdown,
    ) -> Self {
        let output_formatter = OutputFormatter::new(output_mode, verbose, quiet);
        let progress_manager = ProgressManager::new(!quiet && output_mode == OutputMode::Human);

        Self {
            config,
            connector,
            output_formatter,
            progress_manager,
            shutdown,
        }
    }

    /// Create an instance from CLI arguments
    pub fn from_cli(cli_args: &Cli) -> Result<Self> {
        let config = cli_args.load_config()?;
        Self::new(
            config,
            output_mode_for(&cli_args.output_format),
            cli_args.verbose,
            cli_args.quiet,
        )
    }

    fn exporter(&self) -> TableExporter<'_> {
        TableExporter::new(self.connector.as_ref(), ExportContext::from_config(&self.config))
    }

    /// Export one database file and, when enabled, append its run record.
    pub fn export_file(&self, path: &Path) -> FileOutcome {
        let start_time = Instant::now();
        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let table_progress = self.progress_manager.create_table_progress(&source_name);
        let progress_callback = {
            let pb = table_progress.clone();
            move |progress: &ExportProgress| {
                ui::progress::update_table_progress(&pb, progress);
            }
        };

        let result = self.exporter().run_export(path, Some(&progress_callback));

        if result.succeeded {
            ui::progress::finish_progress_with_summary(
                &table_progress,
                &format!("{} tables exported", result.exported_count),
                start_time.elapsed(),
            );
        } else {
            table_progress.finish_and_clear();
        }

        let (report_path, report_error) = if self.config.report.enabled {
            match report::append_report(&result, &self.config.report.file_suffix) {
                Ok(path) => (Some(path), None),
                Err(e) => {
                    warn!("failed to write run report for {}: {}", path.display(), e);
                    (None, Some(e.to_string()))
                }
            }
        } else {
            (None, None)
        };

        FileOutcome {
            result,
            report_path,
            report_error,
        }
    }

    /// Export every database named by `inputs`, one after another.
    ///
    /// Ctrl+C is honoured between files and ends the batch with
    /// [`ExportError::Cancelled`].
    pub fn export_all(&self, inputs: &[PathBuf]) -> Result<Vec<FileOutcome>> {
        let start_time = Instant::now();
        let sources = SourceScanner::new(&self.config.source).collect_inputs(inputs)?;

        if sources.is_empty() {
            self.output_formatter
                .warning("No database files found in the given inputs.");
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::with_capacity(sources.len());
        for path in &sources {
            self.shutdown.check_shutdown()?;

            self.output_formatter
                .start_operation(&format!("Exporting {}", path.display()));
            let outcome = self.export_file(path);
            self.output_formatter.print_run_result(&outcome);
            outcomes.push(outcome);
        }

        if outcomes.len() > 1 {
            self.output_formatter
                .print_batch_summary(&outcomes, start_time.elapsed());
        }

        Ok(outcomes)
    }

    /// Resolve and print what would be exported, without writing anything.
    pub fn plan_all(&self, inputs: &[PathBuf]) -> Result<Vec<ExportPlan>> {
        let sources = SourceScanner::new(&self.config.source).collect_inputs(inputs)?;
        let exporter = self.exporter();

        let mut plans = Vec::with_capacity(sources.len());
        for path in &sources {
            self.shutdown.check_shutdown()?;
            let spinner = self
                .progress_manager
                .create_spinner(&format!("Reading catalog of {}", path.display()));
            let plan = exporter.plan_export(path);
            spinner.finish_and_clear();

            let plan = plan?;
            self.output_formatter.print_plan(&plan);
            plans.push(plan);
        }
        Ok(plans)
    }

    /// Generate sample configuration file
    pub fn generate_sample_config<P: AsRef<Path>>(output_path: P) -> Result<()> {
        let sample_config = Config::create_sample_config();
        std::fs::write(output_path.as_ref(), sample_config)?;
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output_formatter(&self) -> &OutputFormatter {
        &self.output_formatter
    }

    /// Handle error with user-friendly output
    pub fn handle_error(&self, error: &ExportError) {
        self.output_formatter.print_user_friendly_error(error);
    }
}

pub fn output_mode_for(format: &OutputFormat) -> OutputMode {
    match format {
        OutputFormat::Human => OutputMode::Human,
        OutputFormat::Json => OutputMode::Json,
        OutputFormat::Plain => OutputMode::Plain,
    }
}

/// Get build information
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        build_date: option_env!("BUILD_DATE").unwrap_or("unknown"),
        target: std::env::consts::ARCH.to_string(),
        odbc: cfg!(feature = "odbc"),
    }
}

#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_date: &'static str,
    pub target: String,
    pub odbc: bool,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mdb2csv {} ({}) built on {} for {}, ODBC {}",
            self.version,
            self.git_hash,
            self.build_date,
            self.target,
            if self.odbc { "enabled" } else { "disabled" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryConnector, MemorySource, MemoryTable};
    use std::fs;
    use tempfile::TempDir;

    fn app_with_database(report: bool) -> (TempDir, PathBuf, Mdb2Csv) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("shop.mdb");
        fs::write(&db_path, b"").unwrap();

        let source = MemorySource::new().with_table(
            MemoryTable::new("Customers", &["Id", "Name"])
                .with_primary_key(&[("Id", "1")])
                .with_row(&[Some("1"), Some("Ann")]),
        );
        let connector = MemoryConnector::new().with_source(db_path.clone(), source);

        let mut config = Config::default();
        config.report.enabled = report;
        let app = Mdb2Csv::new_for_test(config, Box::new(connector));
        (temp_dir, db_path, app)
    }

    #[test]
    fn test_export_file_with_report() {
        let (_temp_dir, db_path, app) = app_with_database(true);

        let outcome = app.export_file(&db_path);

        assert!(outcome.result.succeeded);
        let report_path = outcome.report_path.unwrap();
        assert!(report_path.ends_with("shop_report.json"));
        assert_eq!(report::load_entries(&report_path).len(), 1);
    }

    #[test]
    fn test_report_disabled_by_default() {
        let (temp_dir, db_path, app) = app_with_database(false);

        let outcome = app.export_file(&db_path);

        assert!(outcome.report_path.is_none());
        assert!(!temp_dir.path().join("shop_report.json").exists());
    }

    #[test]
    fn test_failed_run_is_reported() {
        let (temp_dir, _db_path, app) = app_with_database(true);
        let missing = temp_dir.path().join("gone.mdb");

        let outcome = app.export_file(&missing);

        assert!(!outcome.result.succeeded);
        let entries = report::load_entries(&outcome.report_path.unwrap());
        assert_eq!(entries[0]["status"], "FAILED");
    }

    #[test]
    fn test_export_all_scans_directories() {
        let (temp_dir, _db_path, app) = app_with_database(false);

        let outcomes = app.export_all(&[temp_dir.path().to_path_buf()]).unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(temp_dir.path().join("shop").join("Customers.csv").exists());
    }

    #[test]
    fn test_export_all_stops_when_cancelled() {
        let (_temp_dir, db_path, app) = app_with_database(false);
        app.shutdown.request_shutdown();

        let error = app.export_all(&[db_path]).unwrap_err();

        assert!(matches!(error, ExportError::Cancelled));
    }

    #[test]
    fn test_plan_all() {
        let (_temp_dir, db_path, app) = app_with_database(false);

        let plans = app.plan_all(&[db_path]).unwrap();

        assert_eq!(plans[0].tables[0].sanitized_name, "Customers");
        assert!(!plans[0].output_directory.exists());
    }

    #[test]
    fn test_sample_config_generation() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("sample.toml");

        Mdb2Csv::generate_sample_config(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[export]"));
        assert!(content.contains("[report]"));
    }

    #[test]
    fn test_build_info_display() {
        let build_info = build_info();
        let display_string = build_info.to_string();
        assert!(display_string.contains("mdb2csv"));
        assert!(display_string.contains(build_info.version));
    }
}
