use thiserror::Error;

/// Errors raised by the workbook mutation engine.
///
/// Every variant describes a request the caller should have validated
/// before invoking the operation. The workbook is left untouched when one
/// of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Column index {index} out of bounds ({len} columns) in sheet '{sheet}'")]
    ColumnOutOfRange {
        sheet: String,
        index: usize,
        len: usize,
    },

    #[error("Row index {index} out of bounds ({len} rows) in sheet '{sheet}'")]
    RowOutOfRange {
        sheet: String,
        index: usize,
        len: usize,
    },

    #[error("Column name cannot be empty")]
    EmptyColumnName,

    #[error("Column name '{0}' already exists")]
    DuplicateColumnName(String),

    #[error("Column '{0}' is not editable in the current mode")]
    NotEditable(String),
}

/// Errors raised by workbook services (listing, retrieval, import, storage).
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing bearer token")]
    Unauthorized,

    #[error("Invalid tenant identifier '{0}'")]
    InvalidTenant(String),

    #[error("Workbook '{0}' not found")]
    NotFound(String),

    #[error("Unsupported file type '{0}'")]
    UnsupportedFile(String),

    #[error("File '{0}' does not contain a workbook")]
    Unreadable(String),
}

/// Errors surfaced by an [`crate::session::EditorSession`].
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("{0}")]
    Edit(#[from] EditError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("No workbook loaded")]
    NoWorkbook,
}
