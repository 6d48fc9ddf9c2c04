//! HTTP API module.
//!
//! Hosts the WebSocket upgrade routes and a health endpoint.

mod handlers;
mod routes;
mod state;

pub use handlers::HealthResponse;
pub use routes::create_router;
pub use state::{AppState, SocketSettings};
