use crate::auth::jwt::{Claims, JwtService};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use time::Duration;

pub const AUTH_COOKIE: &str = "auth-token";
pub const SIGNIN_PATH: &str = "/signin";

/// Matched as path prefixes on segment boundaries. `/` is matched exactly.
const PUBLIC_PATHS: [&str; 6] = [
    "/signin",
    "/signup",
    "/privacy",
    "/terms",
    "/api/auth",
    "/api/csp-report",
];

/// Static bundle locations that never require a session.
const ASSET_PATHS: [&str; 4] = ["/_next", "/assets", "/public", "/favicon.ico"];

fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn is_public_path(path: &str) -> bool {
    path == "/"
        || PUBLIC_PATHS.iter().any(|p| matches_prefix(path, p))
        || ASSET_PATHS.iter().any(|p| matches_prefix(path, p))
}

/// Session token from the request cookies. Surrounding quotes are
/// stripped and an empty value counts as absent.
pub fn session_token(jar: &CookieJar) -> Option<&str> {
    jar.get(AUTH_COOKIE)
        .map(|cookie| cookie.value_trimmed())
        .filter(|value| !value.is_empty())
}

/// Claims of a valid session token, `None` for any other state.
pub fn session_claims(jwt: &JwtService, jar: &CookieJar) -> Option<Claims> {
    let token = session_token(jar)?;
    match jwt.decode(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            None
        }
    }
}

/// `auth-token` cookie; a zero `max_age` clears it in the browser.
pub fn session_cookie(token: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .secure(secure)
        .build()
}

/// 驗證 session，未登入的非公開路徑一律導向登入頁
pub async fn require_session(
    State(jwt): State<Arc<JwtService>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_public_path(&path) {
        return next.run(request).await;
    }

    match session_claims(&jwt, &jar) {
        Some(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        None => {
            tracing::debug!("🔒 Redirecting unauthenticated request for {}", path);
            Redirect::temporary(SIGNIN_PATH).into_response()
        }
    }
}
