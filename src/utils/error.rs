use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferralError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Geocoding failed for '{address}': {message}")]
    GeocodingError { address: String, message: String },

    #[error("Resource source unavailable: {message}")]
    SourceError { message: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Conflict: {message}")]
    ConflictError { message: String },

    #[error("Not found: {message}")]
    NotFoundError { message: String },

    #[error("Upstream service error ({status}): {message}")]
    UpstreamError { status: u16, message: String },

    #[error("Messaging error: {message}")]
    MessagingError { message: String, code: Option<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Validation,
    Authentication,
    NotFound,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ReferralError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReferralError::HttpError(_)
            | ReferralError::GeocodingError { .. }
            | ReferralError::UpstreamError { .. }
            | ReferralError::MessagingError { .. } => ErrorCategory::Network,
            ReferralError::CsvError(_)
            | ReferralError::SerializationError(_)
            | ReferralError::SourceError { .. } => ErrorCategory::Data,
            ReferralError::ConfigError { .. }
            | ReferralError::ConfigValidationError { .. }
            | ReferralError::InvalidConfigValueError { .. }
            | ReferralError::MissingConfigError { .. } => ErrorCategory::Configuration,
            ReferralError::ValidationError { .. } | ReferralError::ConflictError { .. } => {
                ErrorCategory::Validation
            }
            ReferralError::TokenError(_) | ReferralError::AuthError { .. } => {
                ErrorCategory::Authentication
            }
            ReferralError::NotFoundError { .. } => ErrorCategory::NotFound,
            ReferralError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::NotFound | ErrorCategory::Authentication => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給使用者看的訊息，不含內部細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            ReferralError::HttpError(_) | ReferralError::UpstreamError { .. } => {
                "An upstream service could not be reached".to_string()
            }
            ReferralError::GeocodingError { address, .. } => {
                format!("Could not locate address: {}", address)
            }
            ReferralError::SourceError { .. } => "Resource data could not be loaded".to_string(),
            ReferralError::CsvError(_) | ReferralError::SerializationError(_) => {
                "Data could not be processed".to_string()
            }
            ReferralError::IoError(_) => "A file could not be read or written".to_string(),
            ReferralError::ConfigError { message } => format!("Configuration problem: {}", message),
            ReferralError::ConfigValidationError { field, .. }
            | ReferralError::InvalidConfigValueError { field, .. } => {
                format!("Configuration value '{}' is invalid", field)
            }
            ReferralError::MissingConfigError { field } => {
                format!("Configuration value '{}' is required", field)
            }
            ReferralError::ValidationError { message } => message.clone(),
            ReferralError::TokenError(_) | ReferralError::AuthError { .. } => {
                "Authentication failed".to_string()
            }
            ReferralError::ConflictError { message } => message.clone(),
            ReferralError::NotFoundError { message } => message.clone(),
            ReferralError::MessagingError { .. } => "Failed to send message".to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the API key, then retry",
            ErrorCategory::Data => "Check that the resource file is a JSON array of records",
            ErrorCategory::Configuration => "Review the TOML configuration and environment variables",
            ErrorCategory::Validation => "Correct the request payload and try again",
            ErrorCategory::Authentication => "Sign in again",
            ErrorCategory::NotFound => "Check the identifier and try again",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReferralError>;
