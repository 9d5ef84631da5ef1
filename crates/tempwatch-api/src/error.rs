//! Error types for the HTTP API.
//!
//! [`ApiError`] unifies all request failure modes into a single enum that
//! converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Each
//! handler's failure is turned into a response here and never escapes
//! to take the process down.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tempwatch_core::WriteError;
use tempwatch_core::writer::FORMAT_HINT;
use tracing::error;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body's `temperatures` field is not an array.
    #[error("temperatures must be an array")]
    NotAnArray,

    /// None of the submitted readings matched the format.
    #[error("No valid temperatures provided")]
    NoValidReadings,

    /// Persisting the readings failed.
    #[error("Failed to update temperatures")]
    WriteFailed(#[source] std::io::Error),

    /// Reading the file back failed.
    #[error("Failed to read temperatures")]
    ReadFailed(#[source] std::io::Error),
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::NoValidReadings => Self::NoValidReadings,
            WriteError::Io { source } => Self::WriteFailed(source),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match &self {
            Self::NotAnArray => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": message }),
            ),
            Self::NoValidReadings => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": message, "hint": FORMAT_HINT }),
            ),
            Self::WriteFailed(e) | Self::ReadFailed(e) => {
                error!(error = %e, "{message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": message }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
