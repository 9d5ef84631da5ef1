//! `WebSocket` handler for the real-time temperature channel.
//!
//! Clients connect to `GET /ws` and become a session in the
//! [`Broadcaster`](tempwatch_core::Broadcaster). Every published reading
//! list is forwarded as a text frame:
//!
//! ```json
//! {"event": "temperatures-update", "data": [{"original": "32C", "celsius": 32.0, "fahrenheit": 89.6}]}
//! ```
//!
//! Clients may send `{"event": "request-data"}`. It is accepted and
//! logged, and has no other effect.

use std::path::Path;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tempwatch_core::{PipelineObserver, Reading, TemperatureUpdate, UPDATE_TOPIC, source};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Inbound event name clients use to ask for data.
pub const REQUEST_DATA_EVENT: &str = "request-data";

/// Reads attempted for a connect snapshot while publishes keep racing it.
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Outbound frame envelope.
#[derive(Debug, serde::Serialize)]
struct Outbound<'a> {
    event: &'static str,
    data: &'a [Reading],
}

/// Inbound frame envelope. Unknown fields are ignored.
#[derive(Debug, serde::Deserialize)]
struct Inbound {
    event: String,
}

/// What a client text frame asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// The `request-data` signal.
    RequestData,
    /// Anything else, including malformed JSON.
    Unknown,
}

/// Encode a reading list as a `temperatures-update` frame.
pub fn encode_update(readings: &[Reading]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Outbound {
        event: UPDATE_TOPIC,
        data: readings,
    })
}

/// Classify a client text frame.
pub fn decode_client_message(text: &str) -> ClientMessage {
    match serde_json::from_str::<Inbound>(text) {
        Ok(inbound) if inbound.event == REQUEST_DATA_EVENT => ClientMessage::RequestData,
        _ => ClientMessage::Unknown,
    }
}

/// Read the current readings for a session that has just registered.
///
/// Updates published while the file was being read are dropped from the
/// session's queue and the file is read again, so nothing older than the
/// snapshot is forwarded after it.
pub async fn initial_snapshot(
    file: &Path,
    observer: &dyn PipelineObserver,
    receiver: &mut mpsc::UnboundedReceiver<TemperatureUpdate>,
) -> Vec<Reading> {
    let mut readings = source::read_and_parse(file, observer).await;
    let mut attempts = 1_usize;
    while attempts < SNAPSHOT_ATTEMPTS && discard_queued(receiver) {
        readings = source::read_and_parse(file, observer).await;
        attempts = attempts.saturating_add(1);
    }
    readings
}

/// Drop every queued update. Returns whether anything was queued.
fn discard_queued(receiver: &mut mpsc::UnboundedReceiver<TemperatureUpdate>) -> bool {
    let mut discarded = false;
    while receiver.try_recv().is_ok() {
        discarded = true;
    }
    discarded
}

/// Upgrade an HTTP request to a `WebSocket` session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_temperatures(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the session lifecycle: register, forward updates, and
/// deregister when either side goes away.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.broadcaster.connect().await;
    let session = subscription.id;
    info!(%session, "Client connected");

    if state.realtime.snapshot_on_connect {
        let readings = initial_snapshot(
            &state.file,
            state.observer.as_ref(),
            &mut subscription.receiver,
        )
        .await;
        if !send_readings(&mut socket, &readings).await {
            state.broadcaster.disconnect(session).await;
            info!(%session, "Client disconnected");
            return;
        }
    }

    loop {
        tokio::select! {
            update = subscription.receiver.recv() => {
                let Some(update) = update else {
                    // The broadcaster dropped this session (shutdown).
                    if let Err(e) = socket.send(Message::Close(None)).await {
                        debug!(%session, "WebSocket close frame not sent: {e}");
                    }
                    break;
                };
                if !send_readings(&mut socket, update.readings()).await {
                    debug!(%session, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%session, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        match decode_client_message(text.as_str()) {
                            ClientMessage::RequestData => {
                                info!(%session, "Client requested data");
                            }
                            ClientMessage::Unknown => {
                                debug!(%session, "Ignoring unrecognised client message");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%session, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Binary and pong frames carry nothing for us.
                    }
                }
            }
        }
    }

    state.broadcaster.disconnect(session).await;
    info!(%session, "Client disconnected");
}

/// Send one update frame. Returns `false` if the client is gone.
async fn send_readings(socket: &mut WebSocket, readings: &[Reading]) -> bool {
    let json = match encode_update(readings) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize temperature update: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempwatch_core::Broadcaster;
    use tempwatch_core::observe::RecordingObserver;
    use tempwatch_core::reading::parse_reading;

    fn originals(readings: &[Reading]) -> Vec<&str> {
        readings.iter().map(|r| r.original.as_str()).collect()
    }

    #[tokio::test]
    async fn snapshot_supersedes_updates_queued_while_reading() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("temperature.txt");
        std::fs::write(&file, "20C\n68F\n").unwrap();
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.connect().await;

        // An older list published after the session registered.
        let stale = TemperatureUpdate::new(parse_reading("1C").into_iter().collect());
        assert_eq!(broadcaster.publish(&stale).await, 1);

        let readings =
            initial_snapshot(&file, &RecordingObserver::new(), &mut subscription.receiver).await;

        assert_eq!(originals(&readings), vec!["20C", "68F"]);
        assert!(subscription.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn snapshot_leaves_later_updates_deliverable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("temperature.txt");
        std::fs::write(&file, "5C\n").unwrap();
        let broadcaster = Broadcaster::new();
        let mut subscription = broadcaster.connect().await;

        let readings =
            initial_snapshot(&file, &RecordingObserver::new(), &mut subscription.receiver).await;
        assert_eq!(originals(&readings), vec!["5C"]);

        let next = TemperatureUpdate::new(parse_reading("6C").into_iter().collect());
        broadcaster.publish(&next).await;
        assert_eq!(subscription.receiver.recv().await.unwrap(), next);
    }

    #[test]
    fn update_frame_carries_topic_and_readings_in_order() {
        let readings: Vec<Reading> = ["32C", "100F"].iter().filter_map(|t| parse_reading(t)).collect();
        let json: serde_json::Value = serde_json::from_str(&encode_update(&readings).unwrap()).unwrap();

        assert_eq!(json["event"], "temperatures-update");
        assert_eq!(json["data"][0]["original"], "32C");
        assert_eq!(json["data"][0]["fahrenheit"], 89.6);
        assert_eq!(json["data"][1]["original"], "100F");
        assert_eq!(json["data"][1]["celsius"], 37.78);
    }

    #[test]
    fn empty_update_is_an_empty_array() {
        let json: serde_json::Value = serde_json::from_str(&encode_update(&[]).unwrap()).unwrap();
        assert_eq!(json["data"], serde_json::json!([]));
    }

    #[test]
    fn request_data_is_recognised() {
        assert_eq!(
            decode_client_message(r#"{"event":"request-data"}"#),
            ClientMessage::RequestData
        );
        assert_eq!(
            decode_client_message(r#"{"event":"request-data","extra":1}"#),
            ClientMessage::RequestData
        );
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(decode_client_message("hello"), ClientMessage::Unknown);
        assert_eq!(
            decode_client_message(r#"{"event":"other"}"#),
            ClientMessage::Unknown
        );
        assert_eq!(decode_client_message("{}"), ClientMessage::Unknown);
    }
}
