use crate::utils::error::{ReferralError, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v17.0";

/// Provider error code for recipients missing from the test contact list.
pub const UNREGISTERED_TEST_NUMBER: i64 = 131030;

const TEST_MODE_MESSAGE: &str = "In test mode, only registered test phone numbers are allowed. \
Please add your number to the WhatsApp test contact list at \
https://developers.facebook.com/docs/whatsapp/cloud-api/get-started";

const UNREGISTERED_MESSAGE: &str = "This phone number is not registered for testing. \
Please register it at https://developers.facebook.com/docs/whatsapp/cloud-api/get-started";

static NON_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").expect("valid regex"));

/// `+` followed by the digits of the input.
pub fn normalize_phone(phone: &str) -> String {
    format!("+{}", NON_DIGITS.replace_all(phone, ""))
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    code: Option<i64>,
    message: Option<String>,
}

/// WhatsApp Cloud API 傳訊客戶端
pub struct WhatsAppClient {
    client: Client,
    api_base: String,
    phone_number_id: String,
    token: String,
    /// `Some` 表示測試模式：只允許清單內的號碼
    test_numbers: Option<Vec<String>>,
}

impl WhatsAppClient {
    pub fn new(phone_number_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            phone_number_id: phone_number_id.into(),
            token: token.into(),
            test_numbers: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_test_numbers(mut self, numbers: Vec<String>) -> Self {
        self.test_numbers = Some(numbers.iter().map(|n| normalize_phone(n)).collect());
        self
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_numbers.is_some()
    }

    /// Sends a text message and returns the provider's JSON reply.
    pub async fn send_text(&self, phone: &str, message: &str) -> Result<Value> {
        if phone.trim().is_empty() || message.trim().is_empty() {
            return Err(ReferralError::ValidationError {
                message: "Message and phone number are required".to_string(),
            });
        }

        let to = normalize_phone(phone);
        if let Some(allowed) = &self.test_numbers {
            if !allowed.contains(&to) {
                tracing::warn!("📵 {} is not on the test contact list", to);
                return Err(ReferralError::MessagingError {
                    message: TEST_MODE_MESSAGE.to_string(),
                    code: Some(UNREGISTERED_TEST_NUMBER),
                });
            }
        }

        let url = format!(
            "{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.phone_number_id
        );
        let body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": message },
        });

        tracing::debug!("Sending WhatsApp message to {}", to);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let data: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            tracing::info!("💬 WhatsApp message sent to {}", to);
            return Ok(data);
        }

        tracing::error!("❌ WhatsApp API error ({}): {}", status, data);
        let provider = serde_json::from_value::<ProviderErrorBody>(data)
            .ok()
            .and_then(|body| body.error);
        let code = provider.as_ref().and_then(|e| e.code);
        if code == Some(UNREGISTERED_TEST_NUMBER) {
            return Err(ReferralError::MessagingError {
                message: UNREGISTERED_MESSAGE.to_string(),
                code,
            });
        }

        Err(ReferralError::UpstreamError {
            status: status.as_u16(),
            message: provider
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Failed to send WhatsApp message".to_string()),
        })
    }
}
