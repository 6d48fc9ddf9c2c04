//! Provider client tests against a local fake of the weather API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use sensorcast::config::ProviderConfig;
use sensorcast::sensor::{FetchError, GeoPoint, SensorSource, WeatherApiClient};
use serde_json::json;
use tokio::net::TcpListener;

const VALID_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct Fake {
    /// Query strings seen by the provider.
    seen: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

async fn current(
    State(fake): State<Fake>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.seen.lock().unwrap().push(params.clone());

    if params.get("key").map(String::as_str) != Some(VALID_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"code": 2006, "message": "API key is invalid."}})),
        )
            .into_response();
    }

    Json(json!({
        "location": {"name": "Paris"},
        "current": {"temp_c": 21.236, "humidity": 58}
    }))
    .into_response()
}

async fn spawn_provider(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, key: Option<&str>, timeout_secs: u64) -> WeatherApiClient {
    WeatherApiClient::new(&ProviderConfig {
        base_url: format!("http://{addr}"),
        api_key: key.map(str::to_string),
        timeout_secs,
    })
    .unwrap()
}

fn eiffel() -> GeoPoint {
    GeoPoint::new(48.8584, 2.2945)
}

/// A good response becomes a rounded measurement and the query carries "lat,lng".
#[tokio::test]
async fn test_fetch_success() {
    let fake = Fake::default();
    let router = Router::new()
        .route("/v1/current.json", get(current))
        .with_state(fake.clone());
    let addr = spawn_provider(router).await;

    let client = client_for(addr, Some(VALID_KEY), 5);
    let measurement = client.fetch(eiffel()).await.unwrap();

    assert_eq!(measurement.temperature, 21.24);
    assert_eq!(measurement.humidity, 58);

    let seen = fake.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["q"], "48.8584,2.2945");
    assert_eq!(seen[0]["key"], VALID_KEY);
}

/// Provider error bodies surface their message.
#[tokio::test]
async fn test_fetch_rejected_key() {
    let router = Router::new()
        .route("/v1/current.json", get(current))
        .with_state(Fake::default());
    let addr = spawn_provider(router).await;

    let err = client_for(addr, Some("wrong"), 5)
        .fetch(eiffel())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        FetchError::Status {
            status: 401,
            message: "API key is invalid.".into(),
        }
    );
}

#[tokio::test]
async fn test_fetch_non_json_body() {
    let router = Router::new().route("/v1/current.json", get(|| async { "<html>busy</html>" }));
    let addr = spawn_provider(router).await;

    let err = client_for(addr, Some(VALID_KEY), 5)
        .fetch(eiffel())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Malformed(_)), "got {err:?}");
}

/// A provider slower than the timeout yields a timeout failure.
#[tokio::test]
async fn test_fetch_timeout() {
    let router = Router::new().route(
        "/v1/current.json",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            "late"
        }),
    );
    let addr = spawn_provider(router).await;

    let err = client_for(addr, Some(VALID_KEY), 1)
        .fetch(eiffel())
        .await
        .unwrap_err();

    assert_eq!(err, FetchError::Timeout(Duration::from_secs(1)));
}

/// Nothing listening is a connection failure, not a panic.
#[tokio::test]
async fn test_fetch_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr, Some(VALID_KEY), 2)
        .fetch(eiffel())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Connection { .. }), "got {err:?}");
}
