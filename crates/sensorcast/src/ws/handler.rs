//! WebSocket handler for client connections.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use sensorcast_protocol::ServerMessage;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::registry::ConnectionId;
use super::session::Session;
use crate::api::AppState;

/// How long the writer may take to flush after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket upgrade handler.
///
/// GET / and GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Drive one accepted socket until the peer leaves or the server shuts down.
pub async fn handle_connection(socket: WebSocket, state: AppState) {
    let id = Uuid::new_v4();
    let (sender, mut receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.socket.outbound_buffer);

    let token = state.shutdown.child_token();
    let mut session = Session::new(id, outbound_tx, &state, token.clone());

    let mut writer = tokio::spawn(write_outbound(
        id,
        sender,
        outbound_rx,
        state.socket.ping_interval,
    ));

    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => {
                debug!("Connection {} closing for shutdown", id);
                break;
            }
            frame = receiver.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
            Some(Ok(Message::Binary(bytes))) => session.handle_binary(&bytes).await,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // axum replies to pings itself
            }
            Some(Ok(Message::Close(_))) | None => {
                info!("Connection {} closed by client", id);
                break;
            }
            Some(Err(e)) => {
                warn!("WebSocket error on connection {}: {}", id, e);
                break;
            }
        }
    }

    // Dropping the session closes the outbound channel and lets the writer finish.
    session.close().await;
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
    info!("WebSocket connection {} finished", id);
}

/// Serialize queued events onto the socket and keep it alive with pings.
async fn write_outbound(
    id: ConnectionId,
    mut sender: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerMessage>,
    ping_interval: Option<Duration>,
) {
    let mut ping = ping_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        let next_ping = async {
            match ping.as_mut() {
                Some(ticker) => {
                    ticker.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else {
                    break;
                };
                let json = match serde_json::to_string(&event) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize event for connection {}: {}", id, e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(json.into())).await {
                    debug!("Send to connection {} failed: {}", id, e);
                    break;
                }
            }

            _ = next_ping => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sender.close().await;
}
