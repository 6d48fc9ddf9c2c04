//! Real-time sensor streaming over WebSocket.
//!
//! Clients connect, send a `subscribe` message naming a landmark and its
//! coordinates, and receive periodic temperature and humidity readings for
//! that point until they subscribe elsewhere, unsubscribe, or disconnect.
//!
//! Layout:
//! - [`sensor`]: provider adapter behind the [`sensor::SensorSource`] trait
//! - [`stream`]: one cancellable poll task per subscription
//! - [`ws`]: per-connection sessions and the socket handler
//! - [`api`]: router, shared state and the health endpoint
//! - [`server`]: listener and graceful shutdown

pub mod api;
pub mod config;
pub mod sensor;
pub mod server;
pub mod stream;
pub mod ws;

pub use sensorcast_protocol as protocol;
