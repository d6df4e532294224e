use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool loads its configuration, ingests tables, or writes run artifacts.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when a CSV table cannot be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when JSON serialization of the run report fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a report configuration file is not valid YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not contain a readable sheet.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the mapping table has no rows for the requested report.
    #[error("no mapping found for report: {report}")]
    MappingNotFound { report: String },

    /// Raised when the mapping does not identify a primary key, either because
    /// no row is flagged or because a required header is missing.
    #[error("primary key not defined in mapping file: {reason}")]
    PrimaryKeyUndefined { reason: String },

    /// Raised when more than one mapping row is flagged as primary key.
    #[error("report {report} flags {count} mapping rows as primary key, expected exactly one")]
    PrimaryKeyAmbiguous { report: String, count: usize },

    /// Raised when a column referenced by the mapping is absent from a table.
    #[error("column '{column}' not found in {table} table")]
    MissingColumn { table: String, column: String },

    /// Raised when no downstream column looks like a record identifier.
    #[error("durable record id column not found in {table} table")]
    DurableIdNotFound { table: String },

    /// Raised when an input folder holds more than one candidate file.
    #[error("{label} folder must contain exactly one file, found {count}")]
    AmbiguousInput { label: String, count: usize },

    /// Raised when an input file has an extension no reader understands.
    #[error("unsupported input file: {0}")]
    UnsupportedInput(PathBuf),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when an archive destination is already taken, either by an
    /// existing file or by another input with the same name.
    #[error("archive destination already taken: {0}")]
    ArchiveConflict(PathBuf),

    /// Raised when a report configuration cannot be located or is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
