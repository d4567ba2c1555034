use crate::domain::model::{Role, User};
use crate::utils::error::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Issued-at as Unix timestamp
    pub iat: i64,
    /// Expiry time as Unix timestamp
    pub exp: i64,
}

/// HS256 簽章與驗證
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    time_valid: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            time_valid: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, time_valid: Duration) -> Self {
        self.time_valid = time_valid;
        self
    }

    pub fn time_valid(&self) -> Duration {
        self.time_valid
    }

    pub fn claims_for(&self, user: &User) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.time_valid).timestamp(),
        }
    }

    pub fn generate_token(&self, user: &User) -> Result<String> {
        self.encode(&self.claims_for(user))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Fails for expired, malformed and wrongly-signed tokens alike.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }
}
