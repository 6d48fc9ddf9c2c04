//! WebSocket module for client connections.
//!
//! Each accepted socket gets a [`Session`] that owns at most one
//! subscription stream, plus a writer task that drains the session's
//! outbound queue onto the wire:
//!
//! ```text
//! client ──frames──▶ handler ──▶ Session ──spawns──▶ SubscriptionStream
//!   ▲                                │                      │
//!   └──────── writer ◀── outbound ◀──┴──── acks / readings ─┘
//! ```

mod handler;
mod registry;
mod session;

pub use handler::{handle_connection, ws_handler};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use session::Session;
