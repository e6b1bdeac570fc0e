pub mod driver;
pub mod enumerator;
pub mod naming;
pub mod query;
pub mod sort_key;
pub mod writer;

pub use driver::{
    output_directory_for, ExportContext, ExportPlan, ExportProgress, ExportRunResult, RunStatus,
    TableDescriptor, TableExporter,
};
pub use enumerator::list_user_tables;
pub use naming::{sanitize_filename, UniqueNameAllocator, MIN_NAME_LENGTH};
pub use query::{quote_identifier, SelectQuery};
pub use sort_key::{resolve_order_columns, SortKey, SortKeyTier};
pub use writer::CsvTableWriter;
