//! Session registry and fan-out of reading lists.
//!
//! Each connected client holds a [`Subscription`] whose receiver yields
//! every [`TemperatureUpdate`] published after it connected. Delivery is
//! fire-and-forget: a session whose receiver is gone is dropped from the
//! active set on the next publish, with no retry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::reading::Reading;

/// Name of the single real-time topic updates are published under.
pub const UPDATE_TOPIC: &str = "temperatures-update";

/// Opaque identifier of a connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The complete current reading list, shared by every recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureUpdate {
    readings: Arc<[Reading]>,
}

impl TemperatureUpdate {
    /// Wrap a freshly parsed reading list.
    pub fn new(readings: Vec<Reading>) -> Self {
        Self {
            readings: readings.into(),
        }
    }

    /// The update sent when the file has been removed.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Readings in file order.
    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    /// Number of readings.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

/// A connected session's end of the fan-out.
#[derive(Debug)]
pub struct Subscription {
    /// The session's identifier, used to disconnect it.
    pub id: SessionId,
    /// Receives every update published while the session is active.
    pub receiver: mpsc::UnboundedReceiver<TemperatureUpdate>,
}

/// Holds the active session set and pushes updates to all of it.
#[derive(Debug, Default)]
pub struct Broadcaster {
    sessions: RwLock<BTreeMap<SessionId, mpsc::UnboundedSender<TemperatureUpdate>>>,
}

impl Broadcaster {
    /// Create a broadcaster with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session.
    ///
    /// The session receives nothing until the next publish.
    pub async fn connect(&self) -> Subscription {
        let (tx, receiver) = mpsc::unbounded_channel();
        let id = SessionId::new();
        self.sessions.write().await.insert(id, tx);
        Subscription { id, receiver }
    }

    /// Remove a session from the active set. Unknown ids are ignored.
    pub async fn disconnect(&self, id: SessionId) {
        self.sessions.write().await.remove(&id);
    }

    /// Drop every session. Their receivers end, which closes the
    /// corresponding client connections. Returns how many were dropped.
    pub async fn disconnect_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    /// Number of sessions currently registered.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Push `update` to every active session.
    ///
    /// The session set is snapshotted at push time; sessions that
    /// connect or disconnect concurrently may or may not be included.
    /// Returns the number of sessions the update was delivered to.
    pub async fn publish(&self, update: &TemperatureUpdate) -> usize {
        let targets: Vec<(SessionId, mpsc::UnboundedSender<TemperatureUpdate>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut delivered = 0_usize;
        let mut gone = Vec::new();
        for (id, tx) in targets {
            if tx.send(update.clone()).is_ok() {
                delivered = delivered.saturating_add(1);
            } else {
                gone.push(id);
            }
        }

        if !gone.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &gone {
                sessions.remove(id);
            }
            tracing::debug!(dropped = gone.len(), "Dropped disconnected sessions");
        }

        delivered
    }
}
