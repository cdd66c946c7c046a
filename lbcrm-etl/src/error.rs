//! Error types for lbcrm-etl

use thiserror::Error;

/// Result type for pipeline operations
pub type EtlResult<T> = std::result::Result<T, EtlError>;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum EtlError {
    /// Spreadsheet could not be opened or read
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failure (connect, timeout, decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hosted store answered with a non-success status
    #[error("Store returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// Local mirror error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// lbcrm-common error
    #[error("Common error: {0}")]
    Common(#[from] lbcrm_common::Error),
}
