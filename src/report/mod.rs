pub mod log;
pub mod warnings;

pub use log::{append_record, append_report, load_entries, report_path_for, RunLogRecord, RunLogStatus};
pub use warnings::build_warning_messages;
