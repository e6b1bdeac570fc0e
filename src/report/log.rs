use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::export::writer::UTF8_BOM;
use crate::export::ExportRunResult;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunLogStatus {
    Success,
    Failed,
}

/// One entry of the persisted run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogRecord {
    pub timestamp: String,
    pub target_file: String,
    pub status: RunLogStatus,
    pub exported_count: usize,
    pub exported_files: Vec<String>,
    pub output_dir: String,
    pub tables_sorted_by_first_column: Vec<String>,
    pub tables_without_sort_key: Vec<String>,
    pub warning_messages: Vec<String>,
    pub message: String,
}

impl RunLogRecord {
    /// Build the record for `result`, stamped with the current local time.
    pub fn from_result(result: &ExportRunResult) -> Self {
        let target = std::path::absolute(&result.source_path)
            .unwrap_or_else(|_| result.source_path.clone());
        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            target_file: target.display().to_string(),
            status: if result.succeeded {
                RunLogStatus::Success
            } else {
                RunLogStatus::Failed
            },
            exported_count: result.exported_count,
            exported_files: result.exported_files.clone(),
            output_dir: result.output_directory.display().to_string(),
            tables_sorted_by_first_column: result.tables_sorted_by_first_column.clone(),
            tables_without_sort_key: result.tables_without_sort_key.clone(),
            warning_messages: result.warning_messages.clone(),
            message: result.report_message.replace('\n', " "),
        }
    }
}

/// `<source dir>/<source stem><suffix>.json`
pub fn report_path_for(source_path: &Path, file_suffix: &str) -> PathBuf {
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = format!("{}{}.json", stem, file_suffix);
    match source_path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Append the record for `result` to the run log next to its source file.
pub fn append_report(result: &ExportRunResult, file_suffix: &str) -> Result<PathBuf> {
    let report_path = report_path_for(&result.source_path, file_suffix);
    append_record(&report_path, &RunLogRecord::from_result(result))?;
    Ok(report_path)
}

/// Append `record` to the JSON array stored at `report_path`.
///
/// Existing entries are kept as they are. A single object is wrapped into an
/// array; anything unreadable starts a fresh log. Not safe for concurrent writers.
pub fn append_record(report_path: &Path, record: &RunLogRecord) -> Result<()> {
    let mut entries = load_entries(report_path);
    entries.push(serde_json::to_value(record)?);

    let json = serde_json::to_string_pretty(&Value::Array(entries))?;
    fs::write(report_path, json)?;
    debug!("run log written to {}", report_path.display());
    Ok(())
}

/// Read the existing log entries, or an empty list when there is nothing usable.
pub fn load_entries(report_path: &Path) -> Vec<Value> {
    let bytes = match fs::read(report_path) {
        Ok(bytes) => bytes,
        Err(_) => return Vec::new(),
    };
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    match serde_json::from_slice::<Value>(content) {
        Ok(Value::Array(entries)) => entries,
        Ok(object @ Value::Object(_)) => vec![object],
        Ok(_) => {
            warn!("{} does not hold a JSON list, starting a new log", report_path.display());
            Vec::new()
        }
        Err(e) => {
            warn!("{} is not valid JSON ({}), starting a new log", report_path.display(), e);
            Vec::new()
        }
    }
}
