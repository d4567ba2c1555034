use axum::{extract::State, routing::get, Json, Router};
use care_referrals::core::retry::RetryPolicy;
use care_referrals::domain::ports::Geocoder;
use care_referrals::GoogleGeocoder;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn policy(base_delay_ms: u64, base_timeout_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(base_delay_ms),
        backoff_factor: 2,
        base_timeout: Duration::from_millis(base_timeout_ms),
    }
}

fn ok_body() -> Value {
    json!({
        "status": "OK",
        "results": [{
            "formatted_address": "600 E 4th St, Charlotte, NC 28202, USA",
            "geometry": {"location": {"lat": 35.2205, "lng": -80.8377}}
        }]
    })
}

/// Fake geocoding endpoint that answers with quota errors for the first
/// `throttled` calls.
async fn spawn_throttling_server(throttled: usize) -> (String, Arc<AtomicUsize>) {
    async fn handler(State((calls, throttled)): State<(Arc<AtomicUsize>, usize)>) -> Json<Value> {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        if call < throttled {
            Json(json!({"status": "OVER_QUERY_LIMIT", "results": []}))
        } else {
            Json(ok_body())
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/geocode", get(handler))
        .with_state((calls.clone(), throttled));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/geocode", address), calls)
}

#[tokio::test]
async fn test_ok_response_yields_coordinates() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/geocode")
            .query_param("address", "600 E 4th St, Charlotte, NC, USA")
            .query_param("key", "test-key")
            .header("user-agent", "HealthcareReferrals/1.0");
        then.status(200).json_body(ok_body());
    });

    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(server.url("/geocode"))
        .with_policy(policy(5, 2000));
    let result = geocoder.geocode("600 E 4th St, Charlotte").await.unwrap();

    api_mock.assert_hits(1);
    assert_eq!(result.lat, 35.2205);
    assert_eq!(result.lng, -80.8377);
    assert_eq!(result.formatted_address, "600 E 4th St, Charlotte, NC 28202, USA");
}

#[tokio::test]
async fn test_zero_results_is_a_single_request() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/geocode");
        then.status(200)
            .json_body(json!({"status": "ZERO_RESULTS", "results": []}));
    });

    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(server.url("/geocode"))
        .with_policy(policy(5, 2000));

    assert_eq!(geocoder.try_geocode("1 Nowhere Rd").await.unwrap(), None);
    api_mock.assert_hits(1);
}

#[tokio::test]
async fn test_quota_errors_then_success() {
    let (endpoint, calls) = spawn_throttling_server(2).await;

    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(endpoint)
        .with_policy(policy(10, 2000));
    let result = geocoder.geocode("600 E 4th St, Charlotte").await;

    assert!(result.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_quota_errors_exhaust_attempts() {
    let (endpoint, calls) = spawn_throttling_server(usize::MAX).await;

    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(endpoint)
        .with_policy(policy(5, 2000));

    assert!(geocoder.try_geocode("600 E 4th St").await.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_persistent_server_error_gives_none_after_three_attempts() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/geocode");
        then.status(500).body("upstream unavailable");
    });

    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(server.url("/geocode"))
        .with_policy(policy(5, 2000));

    assert!(geocoder.geocode("600 E 4th St").await.is_none());
    api_mock.assert_hits(3);
}

#[tokio::test]
async fn test_malformed_body_is_retried() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/geocode");
        then.status(200).body("<html>not json</html>");
    });

    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(server.url("/geocode"))
        .with_policy(policy(5, 2000));

    let err = geocoder.try_geocode("600 E 4th St").await.unwrap_err();
    api_mock.assert_hits(3);
    assert!(err.to_string().contains("600 E 4th St"));
}

#[tokio::test]
async fn test_slow_responses_time_out() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/geocode");
        then.status(200)
            .delay(Duration::from_millis(500))
            .json_body(ok_body());
    });

    // Per-attempt timeouts: 50ms, 100ms, 150ms
    let geocoder = GoogleGeocoder::new("test-key")
        .with_endpoint(server.url("/geocode"))
        .with_policy(policy(5, 50));

    assert!(geocoder.geocode("600 E 4th St").await.is_none());
    api_mock.assert_hits(3);
}
