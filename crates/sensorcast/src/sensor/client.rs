//! WeatherAPI HTTP client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::error::FetchError;
use super::types::{FetchOutcome, GeoPoint, Measurement, SensorSource};
use crate::config::ProviderConfig;

/// Client for the provider's `current.json` endpoint.
#[derive(Clone)]
pub struct WeatherApiClient {
    /// HTTP client with the request timeout applied.
    client: Client,
    /// Base URL (e.g., "http://api.weatherapi.com").
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl WeatherApiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let timeout = config.timeout();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            timeout,
        })
    }

    /// Fetch current conditions for a point.
    pub async fn current(&self, point: GeoPoint) -> FetchOutcome {
        let url = format!("{}/v1/current.json", self.base_url);
        let query = format!("{},{}", point.lat, point.lng);

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", query.as_str())])
            .send()
            .await
            .map_err(|e| self.request_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = provider_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string()
            });
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Malformed(format!("response body is not JSON: {e}"))
            }
        })?;

        parse_current(&body)
    }

    fn request_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Connection {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl fmt::Debug for WeatherApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl SensorSource for WeatherApiClient {
    async fn fetch(&self, point: GeoPoint) -> FetchOutcome {
        self.current(point).await
    }
}

/// Extract a [`Measurement`] from a `current.json` payload.
///
/// Accepts numbers or numeric strings for `temp_c` and `humidity`.
pub fn parse_current(body: &Value) -> FetchOutcome {
    let current = body
        .get("current")
        .ok_or_else(|| FetchError::Malformed("missing \"current\" object".into()))?;

    let temperature = current
        .get("temp_c")
        .and_then(coerce_f64)
        .ok_or_else(|| FetchError::Malformed("missing or non-numeric current.temp_c".into()))?;

    let humidity = current
        .get("humidity")
        .and_then(coerce_f64)
        .ok_or_else(|| FetchError::Malformed("missing or non-numeric current.humidity".into()))?;

    if !(0.0..=100.0).contains(&humidity) {
        return Err(FetchError::Malformed(format!(
            "current.humidity {humidity} is outside [0, 100]"
        )));
    }

    Ok(Measurement::new(temperature, humidity.round() as u8))
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// WeatherAPI error bodies look like `{"error":{"code":1006,"message":"..."}}`.
fn provider_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let config = ProviderConfig {
            base_url: "http://localhost:41900/".into(),
            api_key: Some("secret".into()),
            timeout_secs: 3,
        };
        let client = WeatherApiClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:41900");
        assert_eq!(client.timeout, Duration::from_secs(3));
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[test]
    fn test_parse_current_rounds_temperature() {
        let body = json!({"current": {"temp_c": 21.236, "humidity": 58}});
        let m = parse_current(&body).unwrap();
        assert_eq!(m.temperature, 21.24);
        assert_eq!(m.humidity, 58);
    }

    #[test]
    fn test_parse_current_coerces_strings() {
        let body = json!({"current": {"temp_c": "-4.5", "humidity": "71.6"}});
        let m = parse_current(&body).unwrap();
        assert_eq!(m.temperature, -4.5);
        assert_eq!(m.humidity, 72);
    }

    #[test]
    fn test_parse_current_missing_fields() {
        let err = parse_current(&json!({"location": {}})).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));

        let err = parse_current(&json!({"current": {"humidity": 40}})).unwrap_err();
        assert!(err.to_string().contains("temp_c"));

        let body = json!({"current": {"temp_c": 1.0, "humidity": null}});
        let err = parse_current(&body).unwrap_err();
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn test_parse_current_rejects_out_of_range_humidity() {
        let err = parse_current(&json!({"current": {"temp_c": 1.0, "humidity": 140}})).unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn test_provider_message() {
        let body = r#"{"error":{"code":2006,"message":"API key is invalid."}}"#;
        assert_eq!(provider_message(body).as_deref(), Some("API key is invalid."));
        assert_eq!(provider_message("<html>"), None);
    }
}
