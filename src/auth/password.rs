use crate::utils::error::{ReferralError, Result};
use std::str::FromStr;

pub const MIN_PASSWORD_LEN: usize = 6;

/// bcrypt 雜湊後的密碼
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn verify(&self, password: &str) -> bool {
        pwhash::bcrypt::verify(password, &self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for PasswordHash {
    type Err = ReferralError;

    fn from_str(password: &str) -> Result<Self> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ReferralError::ValidationError {
                message: format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            });
        }
        let hash = pwhash::bcrypt::hash(password).map_err(|e| ReferralError::AuthError {
            message: format!("password hashing failed: {}", e),
        })?;
        Ok(Self(hash))
    }
}
