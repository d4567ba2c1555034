use crate::auth::guard::{session_claims, session_cookie};
use crate::auth::jwt::Claims;
use crate::domain::model::{NewUser, Role, User};
use crate::web::error::ApiError;
use crate::web::state::SharedState;
use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// 回傳給前端的使用者資訊
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<SharedState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.name.trim().is_empty()
        || request.email.trim().is_empty()
        || request.password.is_empty()
    {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    }

    let user = state
        .repository
        .create_user(NewUser {
            name: request.name,
            email: request.email,
            password: request.password,
            role: Role::User,
        })
        .await?;

    Ok(Json(json!({
        "message": "User created successfully",
        "user": SessionUser::from(&user),
    })))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Login attempt for {}", request.email);

    let user = state
        .repository
        .verify_credentials(&request.email, &request.password)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let token = state.jwt.generate_token(&user)?;
    let cookie = session_cookie(
        token,
        time::Duration::seconds(state.jwt.time_valid().num_seconds()),
        state.config.server.secure_cookies,
    );

    tracing::info!("🔓 {} signed in", user.email);
    Ok((
        jar.add(cookie),
        Json(json!({
            "message": "Login successful",
            "user": SessionUser::from(&user),
        })),
    ))
}

/// GET /api/auth/check
pub async fn check(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = session_claims(&state.jwt, &jar)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    Ok(Json(json!({ "user": SessionUser::from(claims) })))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<SharedState>, jar: CookieJar) -> impl IntoResponse {
    let cookie = session_cookie(
        String::new(),
        time::Duration::ZERO,
        state.config.server.secure_cookies,
    );
    (jar.add(cookie), Json(json!({ "success": true })))
}
