use thiserror::Error;

/// Result alias for persistence operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised while writing a run directory.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Unsupported save format name.
    #[error("unknown save format '{0}' (expected json or csv)")]
    UnknownFormat(String),
}
