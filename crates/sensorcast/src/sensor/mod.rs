//! Sensor fetch adapter.
//!
//! Wraps the upstream weather provider behind [`SensorSource`] and turns every
//! round trip into a [`FetchOutcome`]. Provider failures never escape as panics
//! or transport errors; callers only ever see a `Result` value.

mod client;
mod error;
mod types;

pub use client::{WeatherApiClient, parse_current};
pub use error::FetchError;
pub use types::{
    FetchOutcome, GeoPoint, Measurement, SensorSource, TEMPERATURE_DECIMALS, round_to,
};
