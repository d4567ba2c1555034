use crate::core::retry::{Attempt, RetryOutcome, RetryPolicy};
use crate::domain::model::GeocodingResult;
use crate::domain::ports::Geocoder;
use crate::utils::error::{ReferralError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_QUALIFIER: &str = "NC, USA";
const USER_AGENT: &str = "HealthcareReferrals/1.0";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

/// Google Geocoding API 客戶端
pub struct GoogleGeocoder {
    client: Client,
    endpoint: String,
    api_key: String,
    qualifier: String,
    policy: RetryPolicy,
}

impl GoogleGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            qualifier: DEFAULT_QUALIFIER.to_string(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn qualified(&self, address: &str) -> String {
        if self.qualifier.is_empty() {
            address.to_string()
        } else {
            format!("{}, {}", address, self.qualifier)
        }
    }

    async fn attempt(&self, address: &str, timeout: Duration) -> Attempt<GeocodingResult> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .timeout(timeout)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry(format!("Request timed out after {:?}", timeout))
            }
            Err(e) => return Attempt::Retry(format!("Transport error: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Attempt::Retry(format!("HTTP error! status: {}", status.as_u16()));
        }

        match response.json::<GeocodeResponse>().await {
            Ok(body) => classify(body),
            Err(e) => Attempt::Retry(format!("Malformed geocoding response: {}", e)),
        }
    }
}

/// Maps a parsed response body onto the retry verdicts.
fn classify(body: GeocodeResponse) -> Attempt<GeocodingResult> {
    match body.status.as_str() {
        "OK" => match body.results.into_iter().next() {
            Some(first) => Attempt::Done(GeocodingResult {
                lat: first.geometry.location.lat,
                lng: first.geometry.location.lng,
                formatted_address: first.formatted_address,
            }),
            None => Attempt::Retry("Geocoding returned OK without results".to_string()),
        },
        "ZERO_RESULTS" => Attempt::Terminal,
        "OVER_QUERY_LIMIT" => Attempt::Throttled("OVER_QUERY_LIMIT".to_string()),
        other => {
            let detail = body
                .error_message
                .map(|m| format!(" ({})", m))
                .unwrap_or_default();
            Attempt::Retry(format!("Geocoding failed with status: {}{}", other, detail))
        }
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn try_geocode(&self, address: &str) -> Result<Option<GeocodingResult>> {
        let full_address = self.qualified(address);
        tracing::debug!("Geocoding address: {}", full_address);

        let this = self;
        let query = full_address.as_str();
        match self
            .policy
            .run(move |attempt, timeout| {
                tracing::debug!("Geocoding attempt {} with timeout {:?}", attempt, timeout);
                this.attempt(query, timeout)
            })
            .await
        {
            RetryOutcome::Success { value, attempts } => {
                tracing::debug!(
                    "📍 Geocoded '{}' in {} attempt(s): {}, {}",
                    address,
                    attempts,
                    value.lat,
                    value.lng
                );
                Ok(Some(value))
            }
            RetryOutcome::NotFound { .. } => {
                tracing::warn!("No results found for address: {}", address);
                Ok(None)
            }
            RetryOutcome::Exhausted { last_error: message, .. }
            | RetryOutcome::Aborted { error: message, .. } => {
                Err(ReferralError::GeocodingError {
                    address: address.to_string(),
                    message,
                })
            }
        }
    }
}
