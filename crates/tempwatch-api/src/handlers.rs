//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness check |
//! | `GET` | `/api/temperatures` | Raw lines of the temperature file |
//! | `POST` | `/api/temperatures` | Validate and replace the readings |
//!
//! The write handler never publishes to sessions itself. The file write
//! is picked up by the watcher like any other change.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use tempwatch_core::{source, writer};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /api/temperatures`.
///
/// `temperatures` is kept untyped so a non-array value can be rejected
/// with a specific message rather than a generic extractor error.
#[derive(Debug, serde::Deserialize)]
pub struct UpdateRequest {
    /// Candidate reading tokens, e.g. `["32C", "100F"]`.
    #[serde(default)]
    pub temperatures: serde_json::Value,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness check. Carries no pipeline logic.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Temperature monitor server is running",
    }))
}

// ---------------------------------------------------------------------------
// GET /api/temperatures
// ---------------------------------------------------------------------------

/// Return the file's lines as stored, without parsing.
///
/// Invalid lines are included; this is a different view from the
/// parsed objects sent on the real-time channel.
pub async fn get_temperatures(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let temperatures = source::read_raw_lines(&state.file)
        .await
        .map_err(ApiError::ReadFailed)?;

    Ok(Json(serde_json::json!({ "temperatures": temperatures })))
}

// ---------------------------------------------------------------------------
// POST /api/temperatures
// ---------------------------------------------------------------------------

/// Validate the submitted readings and replace the file with the valid ones.
///
/// Non-string entries count as invalid.
pub async fn post_temperatures(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let serde_json::Value::Array(entries) = &request.temperatures else {
        return Err(ApiError::NotAnArray);
    };

    let candidates: Vec<&str> = entries.iter().filter_map(serde_json::Value::as_str).collect();
    let submission = writer::submit(&state.file, &candidates, state.observer.as_ref()).await?;

    tracing::debug!(
        accepted = submission.count(),
        rejected = entries.len().saturating_sub(submission.count()),
        "Temperature submission persisted"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "count": submission.count(),
        "message": "Temperatures updated successfully",
    })))
}
