//! Change-detection → parse → broadcast pipeline for the temperature monitor.
//!
//! The crate watches a single line-delimited temperature file, converts
//! each reading into Celsius and Fahrenheit, and fans the complete list
//! out to every connected session whenever the file settles after a
//! change.
//!
//! # Architecture
//!
//! ```text
//! FileWatcher ──WatchEvent──> Pipeline ──read_and_parse──> Broadcaster ──> sessions
//!      ▲
//!      └── file write (writer::submit)
//! ```
//!
//! The writer never calls the broadcaster. Replacing the file makes the
//! watcher emit `Modified`, so the file is the single source of truth for
//! what clients see.
//!
//! Transport (HTTP, `WebSocket`) lives in `tempwatch-api`; this crate is
//! transport-agnostic.

pub mod broadcast;
pub mod config;
pub mod observe;
pub mod pipeline;
pub mod reading;
pub mod source;
pub mod watcher;
pub mod writer;

// Re-export primary types for convenience.
pub use broadcast::{Broadcaster, SessionId, Subscription, TemperatureUpdate, UPDATE_TOPIC};
pub use config::{ConfigError, MonitorConfig};
pub use observe::{PipelineObserver, SharedObserver, TracingObserver};
pub use pipeline::Pipeline;
pub use reading::{Reading, TemperatureUnit};
pub use watcher::{FileWatcher, WatchEvent, WatchEventKind, WatchHandle, WatcherConfig};
pub use writer::{Submission, WriteError};
