//! HTTP API and real-time channel for the temperature monitor.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) on which every connected session
//!   receives the full reading list each time the watched file settles
//! - **Write endpoint** (`POST /api/temperatures`) that validates and
//!   persists a new set of readings
//! - **Read endpoint** (`GET /api/temperatures`) that returns the raw,
//!   unparsed lines of the file
//! - **Liveness endpoint** (`GET /health`)
//!
//! # Architecture
//!
//! Handlers share one explicit [`AppState`] context. The write endpoint
//! only touches the file; clients see the change when the watcher in
//! `tempwatch-core` reports it and the pipeline publishes through the
//! [`Broadcaster`](tempwatch_core::Broadcaster).

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve};
pub use state::AppState;
