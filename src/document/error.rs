//! Document error types

use thiserror::Error;

/// Errors surfaced by the document service
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Content longer than the configured maximum
    #[error("Document exceeds maximum length of {max} characters")]
    TooLarge { max: usize },

    /// Key absent or expired
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The store reported a failed write for this key
    #[error("Failed to store document: {0}")]
    StorageFailure(String),
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;
