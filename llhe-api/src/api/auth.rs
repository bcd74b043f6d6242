//! Passwordless authentication
//!
//! Login issues a one-time link; the callback exchanges it for a bearer
//! session token. Only SHA-256 digests of either token are stored.

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use llhe_common::time::now;
use llhe_common::tokens::{generate_token, hash_token};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::users;
use crate::error::{ApiError, ApiResult};
use crate::validation::{is_valid_email, JsonBody};
use crate::AppState;

/// Caller identity injected by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub token_hash: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Session gate for protected routes
///
/// Rejects requests without a live session with 401.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> ApiResult<Response> {
    let token_hash = bearer_token(request.headers())
        .map(hash_token)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let user = users::session_user(&state.db, &token_hash)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        token_hash,
    });
    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

/// POST /api/auth/login
pub async fn login(State(state): State<AppState>, JsonBody(req): JsonBody<LoginRequest>) -> ApiResult<Json<Value>> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }

    let token = generate_token();
    let ttl = Duration::minutes(state.config.auth.login_token_ttl_minutes.max(1));
    users::insert_login_token(&state.db, &hash_token(&token), &email, now() + ttl).await?;

    let link = format!(
        "{}/api/auth/callback?token={}",
        state.config.server.site_url.trim_end_matches('/'),
        token
    );

    if let Err(e) = state.link_sender.send_login_link(&email, &link).await {
        warn!(email = %email, "Login link delivery failed: {}", e);
        return Err(ApiError::BadRequest(format!("Provider error: {}", e)));
    }

    let mut body = json!({
        "success": true,
        "message": "Check your email for a sign-in link",
    });
    if state.config.auth.expose_login_link {
        body["login_link"] = json!(link);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: llhe_common::models::User,
}

/// GET /api/auth/callback
pub async fn callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> ApiResult<Json<SessionResponse>> {
    let token = query
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing login token".to_string()))?;

    let email = users::consume_login_token(&state.db, &hash_token(token.trim()))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired login token".to_string()))?;

    let user = users::upsert_by_email(&state.db, &email).await?;
    let access_token = generate_token();
    let expires_at = now() + Duration::hours(state.config.auth.session_ttl_hours.max(1));
    users::create_session(&state.db, &hash_token(&access_token), user.id, expires_at).await?;

    info!(user_id = %user.id, "Session created");

    Ok(Json(SessionResponse {
        access_token,
        token_type: "Bearer",
        expires_at,
        user,
    }))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Value>> {
    users::delete_session(&state.db, &user.token_hash).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/auth/me
pub async fn me(user: AuthUser) -> Json<Value> {
    Json(json!({ "user": user }))
}

/// Routes reachable without a session
pub fn login_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/callback", get(callback))
}

/// Routes that require a session
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers("bearer  abc123 ")), Some("abc123"));
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
