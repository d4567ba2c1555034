use crate::web::error::ApiError;
use crate::web::state::SharedState;
use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub phone_number: String,
}

/// POST /api/whatsapp
pub async fn send_message(
    State(state): State<SharedState>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.message.trim().is_empty() || request.phone_number.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Message and phone number are required".to_string(),
        ));
    }

    let Some(client) = state.whatsapp.as_ref() else {
        tracing::error!("❌ Messaging requested but [messaging] is not configured");
        return Err(ApiError::internal("Internal server error"));
    };

    let data = client
        .send_text(&request.phone_number, &request.message)
        .await?;
    Ok(Json(json!({ "success": true, "data": data })))
}
