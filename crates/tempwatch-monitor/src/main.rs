//! Temperature monitor binary.
//!
//! Wires the change watcher, the parse/broadcast pipeline, and the HTTP
//! + `WebSocket` server together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `tempwatch.yaml` (or defaults) plus env
//! 3. Build the shared context (broadcaster, observer)
//! 4. Start watching the temperature file
//! 5. Start the pipeline task consuming watch events
//! 6. Bind and serve the API
//!
//! # Shutdown Sequence
//!
//! The watcher is stopped first so no new event can fire into a
//! half-torn-down transport. Then the pipeline drains, subscriber
//! connections are closed, and finally the listener stops accepting.

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use tempwatch_api::{AppState, ServerConfig};
use tempwatch_core::{
    Broadcaster, FileWatcher, MonitorConfig, Pipeline, SharedObserver, TracingObserver,
};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::MonitorError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "tempwatch.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, binding, or a background task fails.
#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("tempwatch-monitor starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        file = %config.watch.file.display(),
        port = config.server.port,
        cors_origin = config.server.cors_origin,
        stability_threshold_ms = config.watch.stability_threshold_ms,
        poll_interval_ms = config.watch.poll_interval_ms,
        snapshot_on_connect = config.realtime.snapshot_on_connect,
        "Configuration loaded"
    );

    // 3. Shared context.
    let observer: SharedObserver = Arc::new(TracingObserver);
    let broadcaster = Arc::new(Broadcaster::new());

    // 4. Watch the temperature file.
    let (watch_handle, events) = FileWatcher::spawn(
        &config.watch.file,
        config.watch.watcher_config(),
        Arc::clone(&observer),
    );
    info!(file = %config.watch.file.display(), "Watching file");

    // 5. Pipeline task.
    let pipeline = Pipeline::new(Arc::clone(&broadcaster), Arc::clone(&observer));
    let pipeline_task = tokio::spawn(pipeline.run(events, watch_handle.stop_token()));

    // 6. API server.
    let state = Arc::new(AppState::from_config(
        &config,
        Arc::clone(&broadcaster),
        observer,
    ));
    let listener = tempwatch_api::bind(&ServerConfig::from(&config.server)).await?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut server_task = tokio::spawn(tempwatch_api::serve(listener, state, async move {
        let _ = shutdown_rx.await;
    }));

    // 7. Run until Ctrl-C, or until the server stops on its own.
    let early_exit = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(source) = signal {
                warn!(error = %source, "Failed to listen for shutdown signal");
                return Err(MonitorError::Signal { source });
            }
            None
        }
        result = &mut server_task => Some(result),
    };

    // 8. Ordered shutdown.
    info!("Shutting down gracefully");
    watch_handle.stop();
    watch_handle.join().await;
    pipeline_task.await.map_err(|e| MonitorError::Task {
        message: format!("pipeline task failed: {e}"),
    })?;

    let closed = broadcaster.disconnect_all().await;
    info!(sessions = closed, "Subscriber connections closed");

    // The server may already have exited, in which case nobody listens.
    let _ = shutdown_tx.send(());
    let server_result = match early_exit {
        Some(result) => result,
        None => server_task.await,
    };
    server_result.map_err(|e| MonitorError::Task {
        message: format!("server task failed: {e}"),
    })??;

    info!("Server closed");
    Ok(())
}

/// Load configuration from `TEMPWATCH_CONFIG` or `tempwatch.yaml`.
///
/// A missing file means defaults; environment overrides apply either way.
fn load_config() -> Result<MonitorConfig, MonitorError> {
    let path = std::env::var("TEMPWATCH_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if path.exists() {
        info!(path = %path.display(), "Loading config file");
        Ok(MonitorConfig::from_file(&path)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(MonitorConfig::from_env()?)
    }
}
