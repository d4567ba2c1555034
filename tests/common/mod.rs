#![allow(dead_code)]

use async_trait::async_trait;
use care_referrals::auth::jwt::Claims;
use care_referrals::config::AppConfig;
use care_referrals::domain::model::{GeocodingResult, RawResourceRecord};
use care_referrals::domain::ports::{Geocoder, ResourceSource};
use care_referrals::web::build_router;
use care_referrals::{AppState, InMemoryRepository, Result};
use reqwest::{redirect::Policy, Client};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Resolves every address except ones mentioning "nowhere".
pub struct StubGeocoder;

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn try_geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
        if address.to_lowercase().contains("nowhere") {
            return Ok(None);
        }
        Ok(Some(GeocodingResult {
            lat: 35.9,
            lng: -79.0,
            formatted_address: address.to_uppercase(),
        }))
    }
}

pub struct StaticSource(pub Vec<Value>);

#[async_trait]
impl ResourceSource for StaticSource {
    async fn fetch_rows(&self) -> Result<Vec<RawResourceRecord>> {
        Ok(self.0.iter().cloned().map(RawResourceRecord::from).collect())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.geocoding.api_key = "test-key".to_string();
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.batch.delay_ms = 1;
    config
}

pub fn test_state(config: AppConfig, rows: Vec<Value>) -> AppState {
    AppState::new(
        config,
        Arc::new(StubGeocoder),
        Arc::new(StaticSource(rows)),
        Arc::new(InMemoryRepository::new()),
    )
}

/// Serves the app on an ephemeral port and returns its base URL.
pub async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = build_router(state.shared());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", address)
}

pub fn http_client() -> Client {
    Client::builder().redirect(Policy::none()).build().unwrap()
}

pub fn claims(exp_offset_secs: i64) -> Claims {
    let now = chrono::Utc::now().timestamp();
    Claims {
        sub: "user-1".to_string(),
        email: "worker@example.org".to_string(),
        name: "Case Worker".to_string(),
        role: care_referrals::domain::model::Role::User,
        iat: now - 60,
        exp: now + exp_offset_secs,
    }
}

pub fn auth_cookie(token: &str) -> String {
    format!("auth-token={}", token)
}
