use crate::config::{CliOverrides, Config};
use crate::error::Result;
use crate::export::MIN_NAME_LENGTH;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mdb2csv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Export every table of an Access database to CSV")]
#[command(
    long_about = "mdb2csv exports every user table of a Microsoft Access (.mdb) database \
                  into a sibling directory, one CSV file per table, ordered by the best \
                  available key, and can keep an append-only JSON log of each run."
)]
#[command(before_help = "📦 mdb2csv - Access to CSV Exporter")]
#[command(after_help = "EXAMPLES:\n  \
    mdb2csv sales.mdb\n  \
    mdb2csv sales.mdb inventory.mdb --report\n  \
    mdb2csv ./archive --recursive --output-format json\n  \
    mdb2csv sales.mdb --dry-run -v\n  \
    mdb2csv --generate-config\n\n\
    Run logs are written next to each database as <name>_report.json.")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Access database files or directories containing them
    #[arg(required_unless_present = "generate_config")]
    pub inputs: Vec<PathBuf>,

    /// Append a JSON run record next to each database
    #[arg(long, help = "Write an append-only JSON run report next to each database")]
    pub report: bool,

    /// Scan directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Configuration file path
    #[arg(short, long, env = "MDB2CSV_CONFIG", help = "Path to TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Maximum length of generated CSV file names
    #[arg(long, value_parser = parse_name_length, help = "Maximum CSV file name length (without extension)")]
    pub max_name_length: Option<usize>,

    /// ODBC driver name
    #[arg(long, help = "ODBC driver used to open the databases")]
    pub driver: Option<String>,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Dry run (show what would be done without executing)
    #[arg(long, help = "Show tables, file names and sort keys without writing anything")]
    pub dry_run: bool,

    /// Generate sample configuration file
    #[arg(long, help = "Generate a sample configuration file")]
    pub generate_config: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    /// Flags only override the file when they are given.
    pub fn create_cli_overrides(&self) -> CliOverrides {
        CliOverrides::new()
            .with_report(self.report.then_some(true))
            .with_recursive(self.recursive.then_some(true))
            .with_max_name_length(self.max_name_length)
            .with_driver(self.driver.clone())
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

pub fn parse_name_length(s: &str) -> std::result::Result<usize, String> {
    let value: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", s))?;

    match value {
        v if v < MIN_NAME_LENGTH => Err(format!("Name length must be at least {}", MIN_NAME_LENGTH)),
        v if v > 255 => Err("Name length must be 255 or less".to_string()),
        v => Ok(v),
    }
}
