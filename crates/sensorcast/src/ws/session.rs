//! Per-connection subscription state.

use std::sync::Arc;

use log::{debug, info, warn};
use sensorcast_protocol::{ClientMessage, DecodeError, ServerMessage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::registry::{ConnectionId, ConnectionRegistry};
use crate::api::AppState;
use crate::sensor::SensorSource;
use crate::stream::{PollSchedule, SubscriptionStream, Target};

/// State for one client connection.
///
/// Holds at most one [`SubscriptionStream`]. A new subscribe stops the old
/// stream and waits for it before starting the next, so readings for the old
/// target never follow the new acknowledgement.
pub struct Session {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerMessage>,
    source: Arc<dyn SensorSource>,
    schedule: PollSchedule,
    registry: Arc<ConnectionRegistry>,
    token: CancellationToken,
    current: Option<SubscriptionStream>,
}

impl Session {
    /// Register a new session. `token` should be a child of the server's root.
    pub fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<ServerMessage>,
        state: &AppState,
        token: CancellationToken,
    ) -> Self {
        state.registry.register(id);
        Self {
            id,
            outbound,
            source: state.source.clone(),
            schedule: state.schedule,
            registry: state.registry.clone(),
            token,
            current: None,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Target of the running stream, if any.
    pub fn active(&self) -> Option<&Target> {
        self.current.as_ref().map(SubscriptionStream::target)
    }

    /// Handle one text frame from the client.
    pub async fn handle_text(&mut self, text: &str) {
        self.dispatch(ClientMessage::decode(text)).await;
    }

    /// Binary frames carry the same JSON as text frames.
    pub async fn handle_binary(&mut self, bytes: &[u8]) {
        self.dispatch(ClientMessage::decode_slice(bytes)).await;
    }

    async fn dispatch(&mut self, decoded: Result<ClientMessage, DecodeError>) {
        match decoded {
            Ok(ClientMessage::Subscribe(sub)) => self.subscribe(Target::from(sub)).await,
            Ok(ClientMessage::Unsubscribe) => self.unsubscribe().await,
            Err(e) => {
                // Existing subscription is left running.
                warn!("Rejected message on connection {}: {}", self.id, e);
                self.reply(ServerMessage::Error {
                    code: e.code(),
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Replace any running stream with one for `target`.
    pub async fn subscribe(&mut self, target: Target) {
        if self.stop_current().await {
            debug!("Connection {} superseded its subscription", self.id);
        }

        info!(
            "Connection {} subscribed to '{}' ({}, {})",
            self.id, target.name, target.point.lat, target.point.lng
        );
        self.reply(ServerMessage::Subscribed {
            landmark: target.name.clone(),
            lat: target.point.lat,
            lng: target.point.lng,
            interval_secs: self.schedule.interval().as_secs(),
        })
        .await;

        let stream = SubscriptionStream::spawn(
            target.clone(),
            self.source.clone(),
            self.schedule,
            self.outbound.clone(),
            self.token.child_token(),
        );
        self.registry.set_subscription(self.id, Some(target));
        self.current = Some(stream);
    }

    /// Stop the running stream, if any, and acknowledge.
    pub async fn unsubscribe(&mut self) {
        if self.stop_current().await {
            info!("Connection {} unsubscribed", self.id);
        }
        self.reply(ServerMessage::Unsubscribed).await;
    }

    /// Stop everything this session owns.
    pub async fn close(mut self) {
        self.stop_current().await;
        self.token.cancel();
    }

    async fn stop_current(&mut self) -> bool {
        let Some(stream) = self.current.take() else {
            return false;
        };
        self.registry.set_subscription(self.id, None);
        stream.stop().await;
        true
    }

    async fn reply(&self, message: ServerMessage) {
        let sent = tokio::select! {
            biased;
            _ = self.token.cancelled() => return,
            sent = self.outbound.send(message) => sent,
        };
        if sent.is_err() {
            debug!("Connection {} outbound closed, dropping reply", self.id);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.token.cancel();
        self.registry.unregister(self.id);
    }
}
