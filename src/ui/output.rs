use crate::error::{ExportError, UserFriendlyError};
use crate::export::{ExportPlan, ExportRunResult, RunStatus};
use crate::FileOutcome;
use console::{style, Emoji, Term};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

const INDEX_STATISTICS_WARNING: &str = "This backend cannot read index statistics. \
Tables without a primary key are ordered by their first column, never by a unique index.";

// Emojis with text fallbacks
static CHECKMARK: Emoji = Emoji("✅ ", "✓ ");
static CROSS: Emoji = Emoji("❌ ", "✗ ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static PACKAGE: Emoji = Emoji("📦 ", "> ");
static CLIPBOARD: Emoji = Emoji("📋 ", "* ");

pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn success(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Success, message),
                OutputMode::Json => self.print_json_message("success", message),
                OutputMode::Plain => println!("SUCCESS: {}", message),
            }
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", PACKAGE, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &ExportError) {
        let user_message = error.user_message();
        self.error(&user_message);

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    println!();
                    if self.use_colors {
                        println!(
                            "{}{}",
                            INFO,
                            style(&format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        println!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => {
                    self.print_json_object(&serde_json::json!({
                        "type": "suggestion",
                        "message": suggestion
                    }));
                }
                OutputMode::Plain => {
                    println!("SUGGESTION: {}", suggestion);
                }
            }
        }
    }

    /// Render the outcome of one export run, including where its report went.
    pub fn print_run_result(&self, outcome: &FileOutcome) {
        let result = &outcome.result;
        match self.mode {
            OutputMode::Json => self.print_json_object(&run_result_json(outcome)),
            OutputMode::Human | OutputMode::Plain => {
                let (headline, details, warnings) = split_message(&result.message);
                match result.status {
                    RunStatus::Success => self.success(headline),
                    RunStatus::NoTables => self.warning(headline),
                    RunStatus::Failed(_) => self.error(headline),
                }

                if !result.succeeded || self.should_show_message(0) {
                    for line in details {
                        self.print_detail(line);
                    }
                }
                for warning in warnings {
                    self.warning(&warning.replace('\n', "\n   "));
                }

                if self.should_show_message(1) {
                    for table in &result.tables {
                        self.info(&format!(
                            "{} -> {} ({})",
                            table.raw_name,
                            display_file_name(&table.output_path),
                            table.sort_key_tier
                        ));
                    }
                }

                if let Some(ref path) = outcome.report_path {
                    if self.should_show_message(0) {
                        self.print_detail(&format!("Report: {}", path.display()));
                    }
                }
                if let Some(ref error) = outcome.report_error {
                    self.warning(&format!("Could not write report: {}", error));
                }
            }
        }
    }

    /// Render a dry-run plan.
    pub fn print_plan(&self, plan: &ExportPlan) {
        match self.mode {
            OutputMode::Json => {
                let value = serde_json::to_value(plan)
                    .map(|mut v| {
                        if let Some(obj) = v.as_object_mut() {
                            obj.insert("type".to_string(), serde_json::json!("plan"));
                        }
                        v
                    })
                    .unwrap_or_else(|_| serde_json::json!({}));
                self.print_json_object(&value);
            }
            OutputMode::Human | OutputMode::Plain => {
                self.print_header(&format!("Export plan: {}", plan.source_path.display()));
                if plan.tables.is_empty() {
                    self.warning("No tables to export were found.");
                    return;
                }

                println!("Output directory: {}", plan.output_directory.display());
                println!("Backend: {}", plan.backend);
                if !plan.index_statistics {
                    self.warning(INDEX_STATISTICS_WARNING);
                }
                println!();
                for table in &plan.tables {
                    let order = if table.order_columns.is_empty() {
                        "no ORDER BY".to_string()
                    } else {
                        table.order_columns.join(", ")
                    };
                    let line = format!(
                        "{} -> {} [{}: {}]",
                        table.raw_name,
                        display_file_name(&table.output_path),
                        table.sort_key_tier,
                        order
                    );
                    if self.use_colors && table.sort_key_tier.is_degraded() {
                        println!("  {}", style(line).yellow());
                    } else {
                        println!("  {}", line);
                    }
                }
            }
        }
    }

    /// Summary line after several inputs.
    pub fn print_batch_summary(&self, outcomes: &[FileOutcome], elapsed: Duration) {
        let succeeded = outcomes.iter().filter(|o| o.result.succeeded).count();
        let failed = outcomes.len() - succeeded;
        let tables: usize = outcomes.iter().map(|o| o.result.exported_count).sum();

        match self.mode {
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "summary",
                "files": outcomes.len(),
                "succeeded": succeeded,
                "failed": failed,
                "tables_exported": tables,
                "duration_ms": elapsed.as_millis(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            })),
            OutputMode::Human | OutputMode::Plain => {
                if self.quiet {
                    return;
                }
                self.print_separator();
                let line = format!(
                    "{} files processed: {} succeeded, {} failed, {} tables exported in {}",
                    outcomes.len(),
                    succeeded,
                    failed,
                    tables,
                    format_duration(elapsed)
                );
                if self.use_colors {
                    println!("{}{}", CLIPBOARD, style(line).bold());
                } else {
                    println!("{}", line);
                }
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}{}", CLIPBOARD, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "header",
                    "title": title
                }));
            }
            OutputMode::Plain => {
                println!("=== {} ===", title);
            }
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                if self.use_colors {
                    println!("{}", style("─".repeat(60)).dim());
                } else {
                    println!("{}", "-".repeat(60));
                }
            }
            OutputMode::Plain => {
                println!("{}", "-".repeat(60));
            }
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_detail(&self, line: &str) {
        match self.mode {
            OutputMode::Plain => println!("  {}", line),
            _ => {
                if self.use_colors {
                    println!("   {}", style(line).dim());
                } else {
                    println!("   {}", line);
                }
            }
        }
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        #[allow(clippy::type_complexity)]
        let (emoji, color_fn): (Emoji, Box<dyn Fn(&str) -> console::StyledObject<&str>>) =
            match msg_type {
                MessageType::Success => (CHECKMARK, Box::new(|msg| style(msg).green().bold())),
                MessageType::Error => (CROSS, Box::new(|msg| style(msg).red().bold())),
                MessageType::Warning => (WARNING, Box::new(|msg| style(msg).yellow().bold())),
                MessageType::Info => (INFO, Box::new(|msg| style(msg).cyan())),
            };

        if self.use_colors {
            match msg_type {
                MessageType::Error => eprintln!("{}{}", emoji, color_fn(message)),
                _ => println!("{}{}", emoji, color_fn(message)),
            }
        } else {
            let prefix = match msg_type {
                MessageType::Success => "✓",
                MessageType::Error => "✗",
                MessageType::Warning => "!",
                MessageType::Info => "i",
            };

            match msg_type {
                MessageType::Error => eprintln!("{} {}", prefix, message),
                _ => println!("{} {}", prefix, message),
            }
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

/// Split a run message into its headline, the remaining lines of the first
/// paragraph, and the warning paragraphs that follow.
fn split_message(message: &str) -> (&str, Vec<&str>, Vec<&str>) {
    let mut paragraphs = message.split("\n\n");
    let first = paragraphs.next().unwrap_or_default();
    let mut lines = first.lines();
    let headline = lines.next().unwrap_or_default();
    (headline, lines.collect(), paragraphs.collect())
}

fn display_file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn run_result_json(outcome: &FileOutcome) -> serde_json::Value {
    let result: &ExportRunResult = &outcome.result;
    let category = match result.status {
        RunStatus::Failed(category) => serde_json::to_value(category).ok(),
        _ => None,
    };
    serde_json::json!({
        "type": "run_result",
        "source": result.source_path.display().to_string(),
        "status": result.status.as_str(),
        "error_category": category,
        "succeeded": result.succeeded,
        "exported_count": result.exported_count,
        "exported_files": result.exported_files,
        "output_dir": result.output_directory.display().to_string(),
        "tables": result.tables,
        "tables_sorted_by_first_column": result.tables_sorted_by_first_column,
        "tables_without_sort_key": result.tables_without_sort_key,
        "warning_messages": result.warning_messages,
        "message": result.message,
        "report_path": outcome.report_path.as_ref().map(|p| p.display().to_string()),
        "report_error": outcome.report_error,
    })
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(!formatter.should_show_message(0));
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));
    }

    #[test]
    fn test_split_message() {
        let (headline, details, warnings) =
            split_message("Exported 2 tables to CSV.\nOutput directory: /x\n\nNote: a\nTables: T\n\nNote: b");
        assert_eq!(headline, "Exported 2 tables to CSV.");
        assert_eq!(details, vec!["Output directory: /x"]);
        assert_eq!(warnings, vec!["Note: a\nTables: T", "Note: b"]);

        let (headline, details, warnings) = split_message("No tables to export were found.");
        assert_eq!(headline, "No tables to export were found.");
        assert!(details.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn test_run_result_json() {
        let mut result = ExportRunResult::new(Path::new("/data/sales.mdb"));
        result.status = RunStatus::Failed(ErrorCategory::Connection);
        let outcome = FileOutcome {
            result,
            report_path: Some(PathBuf::from("/data/sales_report.json")),
            report_error: None,
        };

        let json = run_result_json(&outcome);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_category"], "connection");
        assert_eq!(json["report_path"], "/data/sales_report.json");
    }
}
