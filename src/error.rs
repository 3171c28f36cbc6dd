//! Error types for the Hastebin server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::document::DocumentError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The client went away while the body was being read
    #[error("Connection aborted: {0}")]
    ConnectionAborted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage backend errors raised while constructing a store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("S3 SDK error: {0}")]
    SdkError(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported store: {0}")]
    Unsupported(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Document(DocumentError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Document not found.".to_string())
            }
            AppError::Document(DocumentError::TooLarge { .. }) => {
                tracing::warn!("{}", self);
                (
                    StatusCode::BAD_REQUEST,
                    "Document exceeds maximum length.".to_string(),
                )
            }
            AppError::Document(DocumentError::StorageFailure(key)) => {
                tracing::error!(key = %key, "Error adding document");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error adding document.".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ConnectionAborted(msg) => {
                // Nobody is listening for the response
                tracing::debug!("Connection aborted: {}", msg);
                return StatusCode::BAD_REQUEST.into_response();
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found = AppError::from(DocumentError::NotFound("abc".into())).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let too_large = AppError::from(DocumentError::TooLarge { max: 10 }).into_response();
        assert_eq!(too_large.status(), StatusCode::BAD_REQUEST);

        let failure = AppError::from(DocumentError::StorageFailure("abc".into())).into_response();
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let aborted = AppError::ConnectionAborted("reset".into()).into_response();
        assert_eq!(aborted.status(), StatusCode::BAD_REQUEST);
    }
}
