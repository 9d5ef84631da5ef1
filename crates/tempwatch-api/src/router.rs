//! Axum router construction for the API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with a CORS policy restricted to the configured origin.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /health` -- liveness check
/// - `GET /api/temperatures` -- raw lines of the temperature file
/// - `POST /api/temperatures` -- validate and replace the readings
/// - `GET /ws` -- `WebSocket` real-time channel
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin(&state.cors_origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/temperatures",
            get(handlers::get_temperatures).post(handlers::post_temperatures),
        )
        .route("/ws", get(ws::ws_temperatures))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// An origin that is not a valid header value allows no cross-origin
/// requests at all.
fn allowed_origin(origin: &str) -> AllowOrigin {
    match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            warn!(origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(std::iter::empty())
        }
    }
}
