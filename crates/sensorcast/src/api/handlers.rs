//! HTTP request handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Connections with a running stream.
    pub subscriptions: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connections: state.registry.connection_count(),
        subscriptions: state.registry.subscription_count(),
    })
}
