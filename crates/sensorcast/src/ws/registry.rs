//! Live connection bookkeeping for introspection.

use dashmap::DashMap;
use log::info;
use uuid::Uuid;

use crate::stream::Target;

/// Identifier assigned to each accepted WebSocket.
pub type ConnectionId = Uuid;

/// Tracks open connections and what each one is subscribed to.
///
/// Purely observational: sessions own their streams, the registry only mirrors
/// the current target so the health endpoint can report counts.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Connection ID -> active target, if any
    connections: DashMap<ConnectionId, Option<Target>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: ConnectionId) {
        self.connections.insert(id, None);
        info!("Registered WebSocket connection {}", id);
    }

    pub fn unregister(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            info!("Unregistered WebSocket connection {}", id);
        }
    }

    /// Record the connection's current target. Unknown IDs are ignored.
    pub fn set_subscription(&self, id: ConnectionId, target: Option<Target>) {
        if let Some(mut entry) = self.connections.get_mut(&id) {
            *entry = target;
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of connections with an active stream.
    pub fn subscription_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().is_some())
            .count()
    }
}
