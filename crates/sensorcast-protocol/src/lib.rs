//! Wire types for the sensorcast WebSocket protocol.
//!
//! Every frame is a JSON object tagged with a `type` field. Clients send
//! [`ClientMessage`]s to pick the landmark they want readings for; the server
//! answers with a stream of [`ServerMessage`]s.
//!
//! ```text
//! client                                   server
//!   │ {"type":"subscribe","lat":..,...}  ──▶ │
//!   │ ◀── {"type":"subscribed",...}          │
//!   │ ◀── {"type":"sensor",...}              │  every poll interval
//!   │ ◀── {"type":"sensor",...}              │
//!   │ {"type":"subscribe", ...}          ──▶ │  supersedes the first
//! ```

mod commands;
mod events;

pub use commands::{ClientMessage, DecodeError, Subscribe};
pub use events::{ErrorCode, Reading, ServerMessage};
