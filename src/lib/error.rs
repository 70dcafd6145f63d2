//! Error types for loading tabular files into SQL Server.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    /// Source file does not exist
    #[error("source file not found: {0}")]
    NotFound(String),

    /// Requested worksheet is not in the workbook
    #[error("worksheet '{sheet}' not found in '{file}'. Available sheets: [{}]", .available.join(", "))]
    SheetNotFound {
        file: String,
        sheet: String,
        available: Vec<String>,
    },

    /// Requested column is not in the header row
    #[error("column '{column}' not found in '{file}'. Available fields: [{}]", .available.join(", "))]
    Column {
        file: String,
        column: String,
        available: Vec<String>,
    },

    /// File bytes are not valid in the requested encoding
    #[error("failed to decode '{file}' as {encoding}")]
    Decode { file: String, encoding: String },

    /// Server unreachable or login rejected
    #[error("failed to connect to SQL Server at {server}: {source}")]
    Connection {
        server: String,
        #[source]
        source: tiberius::error::Error,
    },

    /// Destination exists and the write mode forbids touching it
    #[error("table {0} already exists")]
    TableExists(String),

    /// Append target has a different column set than the source
    #[error("table {table} has columns [{}] but the source has [{}]", .existing.join(", "), .incoming.join(", "))]
    SchemaMismatch {
        table: String,
        existing: Vec<String>,
        incoming: Vec<String>,
    },

    /// Append target does not exist
    #[error("table {0} does not exist; append requires an existing table")]
    TableNotFound(String),

    /// Caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("source '{0}' has no header row")]
    MissingHeader(String),

    #[error("failed to parse csv file '{file}': {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read workbook '{file}': {source}")]
    Workbook {
        file: String,
        #[source]
        source: calamine::Error,
    },

    /// Value cannot be stored in the destination column's type
    #[error("value '{value}' in column '{column}' of {table} does not fit {sql_type}")]
    Conversion {
        table: String,
        column: String,
        value: String,
        sql_type: String,
    },

    /// Statement failed after the connection was established
    #[error("database error on {table}: {source}")]
    Database {
        table: String,
        #[source]
        source: tiberius::error::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub fn database(table: impl Into<String>, source: tiberius::error::Error) -> Self {
        LoadError::Database {
            table: table.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
