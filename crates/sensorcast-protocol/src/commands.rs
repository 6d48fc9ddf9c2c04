//! Commands sent from client to server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::events::ErrorCode;

/// Message types a client may send.
const KNOWN_TYPES: &[&str] = &["subscribe", "unsubscribe"];

/// Control messages accepted on a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start streaming readings for a point, replacing any current stream.
    Subscribe(Subscribe),

    /// Stop the current stream without closing the connection.
    Unsubscribe,
}

/// Body of a `subscribe` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscribe {
    pub lat: f64,
    pub lng: f64,
    /// Display name echoed back in every reading as `landmark`.
    pub name: String,
}

/// Reasons an inbound frame could not be turned into a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("message has no string \"type\" field")]
    MissingType,

    #[error("unknown message type \"{0}\"")]
    UnknownType(String),

    #[error("invalid {kind} message: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

impl DecodeError {
    /// Machine readable code sent back to the client.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidJson(_) => ErrorCode::InvalidJson,
            Self::MissingType => ErrorCode::MissingType,
            Self::UnknownType(_) => ErrorCode::UnknownType,
            Self::InvalidPayload { .. } => ErrorCode::InvalidPayload,
        }
    }

    fn invalid(kind: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

impl ClientMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Decode a binary frame holding UTF-8 JSON.
    pub fn decode_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(DecodeError::MissingType),
        };

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(DecodeError::UnknownType(kind));
        }

        let message: ClientMessage = serde_json::from_value(value)
            .map_err(|e| DecodeError::invalid(&kind, e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> Result<(), DecodeError> {
        match self {
            Self::Subscribe(sub) => sub.validate(),
            Self::Unsubscribe => Ok(()),
        }
    }
}

impl Subscribe {
    fn validate(&self) -> Result<(), DecodeError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(DecodeError::invalid(
                "subscribe",
                format!("lat {} is outside [-90, 90]", self.lat),
            ));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(DecodeError::invalid(
                "subscribe",
                format!("lng {} is outside [-180, 180]", self.lng),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(DecodeError::invalid("subscribe", "name must not be empty"));
        }
        Ok(())
    }
}
