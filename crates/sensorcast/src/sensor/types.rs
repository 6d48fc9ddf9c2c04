use async_trait::async_trait;

use super::error::FetchError;

/// Decimal places kept for temperatures.
pub const TEMPERATURE_DECIMALS: u32 = 2;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Normalized provider measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Degrees Celsius rounded to [`TEMPERATURE_DECIMALS`].
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: u8,
}

impl Measurement {
    pub fn new(temperature_c: f64, humidity: u8) -> Self {
        Self {
            temperature: round_to(temperature_c, TEMPERATURE_DECIMALS),
            humidity,
        }
    }
}

/// Result of one poll attempt.
pub type FetchOutcome = Result<Measurement, FetchError>;

/// Anything that can report current conditions for a point.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Perform one bounded round trip. Never panics on provider failure.
    async fn fetch(&self, point: GeoPoint) -> FetchOutcome;
}

/// Round to `decimals` places, sending exact ties to the even neighbour.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}
