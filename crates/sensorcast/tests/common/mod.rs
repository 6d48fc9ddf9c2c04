//! Test utilities and common setup.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use sensorcast::api::{AppState, SocketSettings};
use sensorcast::config::ServerConfig;
use sensorcast::protocol::ServerMessage;
use sensorcast::sensor::{FetchOutcome, GeoPoint, Measurement, SensorSource};
use sensorcast::server::Server;
use sensorcast::stream::PollSchedule;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Poll interval used by socket tests.
pub const INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for any single event.
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reports a per-point fetch counter as the temperature.
///
/// Each subscription sees 1.0, 2.0, 3.0, ... for its own coordinates.
#[derive(Default)]
pub struct CountingSource {
    counts: Mutex<HashMap<String, u32>>,
    total: AtomicUsize,
}

impl CountingSource {
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorSource for CountingSource {
    async fn fetch(&self, point: GeoPoint) -> FetchOutcome {
        self.total.fetch_add(1, Ordering::SeqCst);
        let mut counts = self.counts.lock().unwrap();
        let n = counts.entry(format!("{},{}", point.lat, point.lng)).or_default();
        *n += 1;
        Ok(Measurement::new(f64::from(*n), 40))
    }
}

/// App state polling `source` every [`INTERVAL`].
pub fn test_state(source: Arc<dyn SensorSource>) -> AppState {
    test_state_with_socket(source, SocketSettings::default())
}

/// Like [`test_state`] with custom socket settings.
pub fn test_state_with_socket(source: Arc<dyn SensorSource>, socket: SocketSettings) -> AppState {
    AppState::new(source, PollSchedule::fixed(INTERVAL), socket)
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    stop: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start(state: AppState) -> Self {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config, state.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();

        let stop = CancellationToken::new();
        let signal = stop.clone();
        let handle = tokio::spawn(server.run(async move { signal.cancelled().await }));

        Self {
            addr,
            state,
            stop,
            handle,
        }
    }

    pub async fn connect(&self, path: &str) -> Client {
        let (ws, _) = connect_async(format!("ws://{}{}", self.addr, path))
            .await
            .unwrap();
        ws
    }

    /// Trigger graceful shutdown and wait for the server to return.
    pub async fn shutdown(self) {
        self.stop.cancel();
        tokio::time::timeout(EVENT_TIMEOUT, self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

pub fn subscribe_json(name: &str, lat: f64, lng: f64) -> String {
    serde_json::json!({"type": "subscribe", "lat": lat, "lng": lng, "name": name}).to_string()
}

pub async fn send_text(ws: &mut Client, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

/// Next raw frame of any kind.
pub async fn next_frame(ws: &mut Client) -> Message {
    tokio::time::timeout(EVENT_TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for frame")
        .expect("connection ended")
        .unwrap()
}

/// Assert nothing at all arrives for `period`.
pub async fn assert_silent(ws: &mut Client, period: Duration) {
    if let Ok(frame) = tokio::time::timeout(period, ws.next()).await {
        panic!("expected silence, got {frame:?}");
    }
}

/// Next protocol event, skipping control frames.
pub async fn next_event(ws: &mut Client) -> ServerMessage {
    loop {
        match next_frame(ws).await {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Next sensor reading, skipping acknowledgements.
pub async fn next_reading(ws: &mut Client) -> sensorcast::protocol::Reading {
    loop {
        if let ServerMessage::Sensor(reading) = next_event(ws).await {
            return reading;
        }
    }
}

/// Wait until the server closes the socket.
pub async fn wait_closed(ws: &mut Client) {
    loop {
        let frame = tokio::time::timeout(EVENT_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close");
        match frame {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

/// Poll `check` until it holds or the event timeout elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
