use crate::core::Storage;
use crate::domain::model::RawResourceRecord;
use crate::domain::ports::ResourceSource;
use crate::utils::error::{ReferralError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Rows must be a JSON array; anything else is a source error.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<RawResourceRecord>> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(rows) => Ok(rows.into_iter().map(RawResourceRecord::from).collect()),
        other => Err(ReferralError::SourceError {
            message: format!("expected a JSON array, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// 從檔案讀取試算表匯出的 JSON
pub struct FileResourceSource<S: Storage> {
    storage: S,
    path: String,
}

impl<S: Storage> FileResourceSource<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        Self {
            storage,
            path: path.into(),
        }
    }
}

#[async_trait]
impl<S: Storage> ResourceSource for FileResourceSource<S> {
    async fn fetch_rows(&self) -> Result<Vec<RawResourceRecord>> {
        tracing::debug!("Reading resource rows from {}", self.path);
        let bytes = self.storage.read_file(&self.path).await?;
        parse_rows(&bytes)
    }
}

/// 從內部 HTTP 端點取得資源 JSON
pub struct HttpResourceSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpResourceSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ResourceSource for HttpResourceSource {
    async fn fetch_rows(&self) -> Result<Vec<RawResourceRecord>> {
        tracing::debug!("Fetching resource rows from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReferralError::SourceError {
                message: format!("{} returned {}", self.url, status),
            });
        }

        let bytes = response.bytes().await?;
        parse_rows(&bytes)
    }
}
