//! End-to-end tests for the real-time `WebSocket` channel.
//!
//! A real server is bound to an ephemeral port and driven with a
//! `tokio-tungstenite` client.

#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tempwatch_api::server::{ServerConfig, bind, serve};
use tempwatch_api::state::AppState;
use tempwatch_core::observe::RecordingObserver;
use tempwatch_core::reading::parse_reading;
use tempwatch_core::{Broadcaster, TemperatureUpdate};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

struct Running {
    addr: SocketAddr,
    broadcaster: Arc<Broadcaster>,
    shutdown: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

async fn start(file_content: Option<&str>, snapshot_on_connect: bool) -> Running {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("temperature.txt");
    if let Some(content) = file_content {
        std::fs::write(&file, content).unwrap();
    }

    let broadcaster = Arc::new(Broadcaster::new());
    let state = Arc::new(
        AppState::new(
            &file,
            Arc::clone(&broadcaster),
            Arc::new(RecordingObserver::new()),
        )
        .with_snapshot_on_connect(snapshot_on_connect),
    );

    let listener = bind(&ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        serve(listener, state, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });

    Running {
        addr,
        broadcaster,
        shutdown,
        server,
        _dir: dir,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    client
}

async fn wait_for_sessions(broadcaster: &Broadcaster, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while broadcaster.session_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

fn update(tokens: &[&str]) -> TemperatureUpdate {
    TemperatureUpdate::new(tokens.iter().filter_map(|t| parse_reading(t)).collect())
}

#[tokio::test]
async fn published_updates_reach_every_client() {
    let running = start(None, false).await;
    let mut a = connect(running.addr).await;
    let mut b = connect(running.addr).await;
    wait_for_sessions(&running.broadcaster, 2).await;

    assert_eq!(running.broadcaster.publish(&update(&["32C", "100F"])).await, 2);

    for client in [&mut a, &mut b] {
        let json = next_json(client).await;
        assert_eq!(json["event"], "temperatures-update");
        assert_eq!(json["data"][0]["original"], "32C");
        assert_eq!(json["data"][1]["celsius"], 37.78);
    }

    let _ = running.shutdown.send(());
    running.broadcaster.disconnect_all().await;
    running.server.await.unwrap();
}

#[tokio::test]
async fn closing_the_socket_disconnects_the_session() {
    let running = start(None, false).await;
    let mut client = connect(running.addr).await;
    wait_for_sessions(&running.broadcaster, 1).await;

    client.close(None).await.unwrap();
    wait_for_sessions(&running.broadcaster, 0).await;

    let _ = running.shutdown.send(());
    running.server.await.unwrap();
}

#[tokio::test]
async fn request_data_is_accepted_without_reply() {
    let running = start(Some("32C\n"), false).await;
    let mut client = connect(running.addr).await;
    wait_for_sessions(&running.broadcaster, 1).await;

    client
        .send(Message::Text(r#"{"event":"request-data"}"#.into()))
        .await
        .unwrap();

    let nothing = tokio::time::timeout(Duration::from_millis(300), client.next()).await;
    assert!(nothing.is_err());

    // The session is still live.
    running.broadcaster.publish(&update(&["1C"])).await;
    assert_eq!(next_json(&mut client).await["data"][0]["original"], "1C");

    let _ = running.shutdown.send(());
    running.broadcaster.disconnect_all().await;
    running.server.await.unwrap();
}

#[tokio::test]
async fn snapshot_on_connect_sends_current_readings() {
    let running = start(Some("20C\nbad\n68F\n"), true).await;
    let mut client = connect(running.addr).await;

    let json = next_json(&mut client).await;
    assert_eq!(json["event"], "temperatures-update");
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"][1]["original"], "68F");

    let _ = running.shutdown.send(());
    running.broadcaster.disconnect_all().await;
    running.server.await.unwrap();
}

#[tokio::test]
async fn disconnect_all_closes_client_connections() {
    let running = start(None, false).await;
    let mut client = connect(running.addr).await;
    wait_for_sessions(&running.broadcaster, 1).await;

    assert_eq!(running.broadcaster.disconnect_all().await, 1);

    let closed = tokio::time::timeout(WAIT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);

    let _ = running.shutdown.send(());
    running.server.await.unwrap();
}
