//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::sensor::SensorSource;
use crate::stream::PollSchedule;
use crate::ws::ConnectionRegistry;

/// Per-connection socket settings.
#[derive(Clone, Copy, Debug)]
pub struct SocketSettings {
    /// Interval between WebSocket Ping frames, `None` to disable.
    pub ping_interval: Option<Duration>,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
}

impl From<&ServerConfig> for SocketSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            outbound_buffer: config.outbound_buffer.max(1),
        }
    }
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Provider every stream polls.
    pub source: Arc<dyn SensorSource>,
    pub schedule: PollSchedule,
    pub socket: SocketSettings,
    /// Open connections and their subscriptions.
    pub registry: Arc<ConnectionRegistry>,
    /// Root of the cancellation tree; cancelled on server shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        source: Arc<dyn SensorSource>,
        schedule: PollSchedule,
        socket: SocketSettings,
    ) -> Self {
        Self {
            source,
            schedule,
            socket,
            registry: Arc::new(ConnectionRegistry::new()),
            shutdown: CancellationToken::new(),
        }
    }
}
