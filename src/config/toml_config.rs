use crate::core::address::AddressFormatter;
use crate::core::batch::{BatchGeocoder, FALLBACK_COORDINATE};
use crate::core::retry::RetryPolicy;
use crate::domain::model::Coordinate;
use crate::domain::ports::Geocoder;
use crate::utils::error::{ReferralError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_substituted, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub messaging: Option<MessagingConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 前端打包輸出目錄
    pub static_dir: Option<String>,
    pub cors_origins: Vec<String>,
    /// Adds `Secure` to the session cookie
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            static_dir: None,
            cors_origins: Vec::new(),
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub api_key: String,
    pub endpoint: Option<String>,
    /// Appended to every query, e.g. "NC, USA"
    pub qualifier: String,
    /// Region designator inserted by the address formatter
    pub region: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub base_timeout_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: None,
            qualifier: crate::core::geocoding::DEFAULT_QUALIFIER.to_string(),
            region: crate::core::address::DEFAULT_REGION.to_string(),
            max_attempts: 3,
            base_delay_ms: 2000,
            base_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub size: usize,
    pub delay_ms: u64,
    /// Where unplaceable resources are pinned
    pub fallback_lat: f64,
    pub fallback_lng: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: crate::core::batch::DEFAULT_BATCH_SIZE,
            delay_ms: 1000,
            fallback_lat: FALLBACK_COORDINATE.lat,
            fallback_lng: FALLBACK_COORDINATE.lng,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory that relative data paths resolve against
    pub base_path: String,
    pub resources_file: Option<String>,
    pub resources_url: Option<String>,
    /// Request timeout for `resources_url`
    pub source_timeout_secs: u64,
    /// Where `/api/log-errors` writes its reports
    pub errors_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            base_path: ".".to_string(),
            resources_file: Some("data/resources.json".to_string()),
            resources_url: None,
            source_timeout_secs: 30,
            errors_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub admin_name: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: crate::auth::jwt::DEFAULT_TOKEN_TTL_HOURS,
            admin_name: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub phone_number_id: String,
    pub token: String,
    pub api_base: Option<String>,
    /// When set, only these recipients are allowed
    pub test_numbers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub verbose: bool,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ReferralError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ReferralError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${JWT_SECRET})，未設定者原樣保留
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.geocoding.max_attempts,
            base_delay: Duration::from_millis(self.geocoding.base_delay_ms),
            backoff_factor: 2,
            base_timeout: Duration::from_millis(self.geocoding.base_timeout_ms),
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch.delay_ms)
    }

    pub fn fallback_coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.batch.fallback_lat,
            lng: self.batch.fallback_lng,
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.data.source_timeout_secs)
    }

    /// Batch orchestrator with every `[batch]` and region setting applied.
    pub fn batch_geocoder<G: Geocoder + ?Sized + 'static>(
        &self,
        geocoder: std::sync::Arc<G>,
    ) -> BatchGeocoder<G> {
        BatchGeocoder::new(geocoder)
            .with_formatter(AddressFormatter::new(self.geocoding.region.clone()))
            .with_batch_size(self.batch.size)
            .with_batch_delay(self.batch_delay())
            .with_fallback(self.fallback_coordinate())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl AppConfig {
    /// Checks only what the offline `geocode` command needs.
    pub fn validate_geocoding(&self) -> Result<()> {
        // 密鑰必須來自環境變數
        validate_substituted("geocoding.api_key", &self.geocoding.api_key)?;
        validate_non_empty_string("geocoding.api_key", &self.geocoding.api_key)?;

        if let Some(endpoint) = &self.geocoding.endpoint {
            validate_url("geocoding.endpoint", endpoint)?;
        }
        validate_range("geocoding.max_attempts", self.geocoding.max_attempts, 1, 10)?;
        validate_positive_number("batch.size", self.batch.size, 1)?;
        validate_range("batch.fallback_lat", self.batch.fallback_lat, -90.0, 90.0)?;
        validate_range("batch.fallback_lng", self.batch.fallback_lng, -180.0, 180.0)?;
        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_geocoding()?;

        validate_substituted("auth.jwt_secret", &self.auth.jwt_secret)?;
        validate_non_empty_string("auth.jwt_secret", &self.auth.jwt_secret)?;
        for origin in &self.server.cors_origins {
            validate_url("server.cors_origins", origin)?;
        }
        validate_range("auth.token_ttl_hours", self.auth.token_ttl_hours, 1, 24 * 30)?;

        // resources_url 優先於 resources_file
        match (&self.data.resources_url, &self.data.resources_file) {
            (Some(url), _) => validate_url("data.resources_url", url)?,
            (None, Some(file)) => validate_path("data.resources_file", file)?,
            (None, None) => {
                return Err(ReferralError::MissingConfigError {
                    field: "data.resources_file".to_string(),
                })
            }
        }
        validate_range("data.source_timeout_secs", self.data.source_timeout_secs, 1, 600)?;
        validate_path("data.base_path", &self.data.base_path)?;
        validate_path("data.errors_dir", &self.data.errors_dir)?;

        if let Some(messaging) = &self.messaging {
            validate_substituted("messaging.token", &messaging.token)?;
            validate_non_empty_string("messaging.phone_number_id", &messaging.phone_number_id)?;
            if let Some(api_base) = &messaging.api_base {
                validate_url("messaging.api_base", api_base)?;
            }
        }

        if self.auth.admin_email.is_some() != self.auth.admin_password.is_some() {
            return Err(ReferralError::ConfigValidationError {
                field: "auth.admin_email".to_string(),
                message: "admin_email and admin_password must be set together".to_string(),
            });
        }

        Ok(())
    }
}
