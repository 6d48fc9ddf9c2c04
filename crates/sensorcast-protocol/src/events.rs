//! Events sent from server to client.

use serde::{Deserialize, Serialize};

/// Events pushed to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A fresh reading for the current subscription.
    Sensor(Reading),

    /// A subscribe command was accepted and polling has started.
    Subscribed {
        landmark: String,
        lat: f64,
        lng: f64,
        interval_secs: u64,
    },

    /// The current subscription was stopped on request.
    Unsubscribed,

    /// A control message was rejected. Subscription state is unchanged.
    Error { code: ErrorCode, message: String },
}

/// One point-in-time measurement for a landmark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub landmark: String,
    pub lat: f64,
    pub lng: f64,
    /// Degrees Celsius, two decimal places.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidJson,
    MissingType,
    UnknownType,
    InvalidPayload,
}
