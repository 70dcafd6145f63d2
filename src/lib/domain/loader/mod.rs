pub mod processor;
pub mod setup;
pub mod summary;
pub mod writer;

pub use processor::{CsvToMssql, ExcelToMssql};
pub use setup::{SourceKind, setup_logging};
pub use summary::{LoadSummary, log_summary};
pub use writer::{ColumnDef, Destination, WriteReport, write_table};
