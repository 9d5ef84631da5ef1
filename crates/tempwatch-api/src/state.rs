//! Shared application state for the API server.
//!
//! [`AppState`] is the explicit context object handed to every handler:
//! the session registry, the watched file's path, the diagnostics
//! observer, and the real-time options. Nothing is kept in globals.

use std::path::PathBuf;
use std::sync::Arc;

use tempwatch_core::config::RealtimeSection;
use tempwatch_core::{Broadcaster, MonitorConfig, SharedObserver};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Registry of connected real-time sessions.
    pub broadcaster: Arc<Broadcaster>,
    /// Path of the temperature file.
    pub file: PathBuf,
    /// Diagnostics sink shared with the pipeline.
    pub observer: SharedObserver,
    /// Real-time channel options.
    pub realtime: RealtimeSection,
    /// The single origin allowed by the cross-origin policy.
    pub cors_origin: String,
}

impl AppState {
    /// Create state for `file` with default real-time and CORS settings.
    pub fn new(
        file: impl Into<PathBuf>,
        broadcaster: Arc<Broadcaster>,
        observer: SharedObserver,
    ) -> Self {
        let defaults = MonitorConfig::default();
        Self {
            broadcaster,
            file: file.into(),
            observer,
            realtime: defaults.realtime,
            cors_origin: defaults.server.cors_origin,
        }
    }

    /// Create state from a loaded configuration.
    pub fn from_config(
        config: &MonitorConfig,
        broadcaster: Arc<Broadcaster>,
        observer: SharedObserver,
    ) -> Self {
        Self {
            broadcaster,
            file: config.watch.file.clone(),
            observer,
            realtime: config.realtime,
            cors_origin: config.server.cors_origin.clone(),
        }
    }

    /// Enable or disable pushing the current readings on connect.
    #[must_use]
    pub fn with_snapshot_on_connect(mut self, enabled: bool) -> Self {
        self.realtime.snapshot_on_connect = enabled;
        self
    }
}
