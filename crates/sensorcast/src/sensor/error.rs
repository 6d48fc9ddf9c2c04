//! Fetch failure reasons.

use std::time::Duration;

use thiserror::Error;

/// Why a single poll of the provider produced no measurement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Could not reach the provider.
    #[error("provider unreachable at {url}: {message}")]
    Connection { url: String, message: String },

    /// No complete response within the configured timeout.
    #[error("provider did not answer within {0:?}")]
    Timeout(Duration),

    /// Provider answered with a non-success status.
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response was missing fields or not JSON.
    #[error("malformed provider payload: {0}")]
    Malformed(String),
}
