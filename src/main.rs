use clap::Parser;
use mdb2csv::{
    Cli, ErrorCategory, ExportError, FileOutcome, Mdb2Csv, OutputFormatter, OutputMode, RunStatus,
    UserFriendlyError,
};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    // Parse CLI arguments
    let cli = Cli::parse();
    setup_logging(&cli);
    debug!("{}", mdb2csv::build_info());

    // Handle special commands first
    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let app = match Mdb2Csv::from_cli(&cli) {
        Ok(app) => app,
        Err(e) => {
            print_startup_error(&e);
            return error_exit_code(&e);
        }
    };

    if cli.dry_run {
        return handle_dry_run(&cli, &app);
    }

    match app.export_all(&cli.inputs) {
        Ok(outcomes) => outcomes_exit_code(&outcomes),
        Err(e) => {
            app.handle_error(&e);
            error_exit_code(&e)
        }
    }
}

/// The first failing database decides the exit code.
fn outcomes_exit_code(outcomes: &[FileOutcome]) -> i32 {
    outcomes
        .iter()
        .find_map(|outcome| match outcome.result.status {
            RunStatus::Success => None,
            RunStatus::NoTables => Some(4),
            RunStatus::Failed(category) => Some(category_exit_code(category)),
        })
        .unwrap_or(0)
}

fn error_exit_code(error: &ExportError) -> i32 {
    category_exit_code(error.category())
}

fn category_exit_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Input => 2,
        ErrorCategory::Connection => 3,
        ErrorCategory::CatalogRead | ErrorCategory::Query | ErrorCategory::Io => 5,
        ErrorCategory::Environment => 6,
        ErrorCategory::Config => 7,
        ErrorCategory::Cancelled => 130,
        ErrorCategory::Report => 1,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "mdb2csv.toml".to_string());

    match Mdb2Csv::generate_sample_config(&config_path) {
        Ok(()) => {
            println!("Generated sample configuration file: {}", config_path);
            println!("\nTo use this configuration:");
            println!("  mdb2csv <database.mdb> --config {}", config_path);
            println!("\nEdit the file to customize settings for your needs.");
            0
        }
        Err(e) => {
            eprintln!("Failed to generate configuration file: {}", e.user_message());
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            1
        }
    }
}

fn handle_dry_run(cli: &Cli, app: &Mdb2Csv) -> i32 {
    let formatter = app.output_formatter();

    formatter.info("DRY RUN MODE - No files will be written");
    formatter.print_separator();

    let config = app.config();
    formatter.info("Configuration that would be used:");
    formatter.info(&format!("  Driver: {}", config.source.driver));
    formatter.info(&format!("  Extensions: {}", config.source.extensions.join(", ")));
    formatter.info(&format!(
        "  Max name length: {}",
        config.export.max_name_length
    ));
    formatter.info(&format!("  Report: {}", config.report.enabled));
    formatter.print_separator();

    match app.plan_all(&cli.inputs) {
        Ok(plans) => {
            formatter.print_separator();
            formatter.success(&format!("Dry run completed for {} database(s)", plans.len()));
            formatter.info("Run without --dry-run to perform the export");
            0
        }
        Err(e) => {
            app.handle_error(&e);
            error_exit_code(&e)
        }
    }
}

fn print_startup_error(error: &ExportError) {
    let formatter = OutputFormatter::new(OutputMode::Human, 0, false);
    formatter.print_user_friendly_error(error);
}

/// Diagnostics go to stderr so stdout stays clean for `--output-format json`.
fn setup_logging(cli: &Cli) {
    let default_level = match cli.verbosity_level() {
        0 => "mdb2csv=warn",
        1 => "mdb2csv=info",
        _ => "mdb2csv=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
