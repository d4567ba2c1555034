use crate::web::error::ApiError;
use crate::web::state::SharedState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// GET /api/users，最新建立的帳號在前
pub async fn list_users(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let mut users = state.repository.get_users().await?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(json!({ "users": users })))
}
