//! Signed media uploads
//!
//! A signed-in user asks for an upload URL; the object PUT itself carries
//! only the signature and is not behind the session gate.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    routing::{post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use llhe_common::time::now;
use llhe_common::tokens::{sign_upload, verify_upload, UploadCheck};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::storage::public_url;
use crate::validation::JsonBody;
use crate::AppState;

/// Accepted content types and the extension given to stored objects
pub const ALLOWED_CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
    ("audio/mpeg", "mp3"),
    ("audio/wav", "wav"),
    ("audio/webm", "weba"),
    ("audio/mp4", "m4a"),
    ("video/mp4", "mp4"),
    ("video/webm", "webm"),
];

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(ct, _)| *ct == essence)
        .map(|(_, ext)| *ext)
}

#[derive(Debug, Deserialize)]
pub struct UploadUrlRequest {
    #[serde(default)]
    pub file_name: Option<String>,
    pub content_type: String,
}

#[derive(Debug, Serialize)]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub path: String,
    pub public_url: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/upload/url
pub async fn create_upload_url(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<UploadUrlRequest>,
) -> ApiResult<Json<UploadUrlResponse>> {
    let ext = extension_for(&req.content_type)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported content type: {}", req.content_type)))?;

    let path = format!("{}/{}.{}", user.id, Uuid::new_v4(), ext);
    let expires_at = now() + Duration::seconds(state.config.storage.upload_url_ttl_secs.max(1));
    let expires = expires_at.timestamp();
    let signature = sign_upload(&path, expires, &state.config.storage.signing_secret);

    let upload_url = format!(
        "{}/api/upload/object/{}?expires={}&signature={}",
        state.config.server.site_url.trim_end_matches('/'),
        path,
        expires,
        signature
    );

    info!(
        user_id = %user.id,
        path = %path,
        file_name = req.file_name.as_deref().unwrap_or(""),
        "Upload URL issued"
    );

    Ok(Json(UploadUrlResponse {
        upload_url,
        public_url: public_url(&path),
        path,
        expires_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ObjectUploadQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// PUT /api/upload/object/*path
pub async fn upload_object(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<ObjectUploadQuery>,
    headers: HeaderMap,
    body: Body,
) -> ApiResult<Json<serde_json::Value>> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature) else {
        return Err(ApiError::Unauthorized("Missing upload signature".to_string()));
    };

    match verify_upload(&path, expires, &signature, &state.config.storage.signing_secret, now().timestamp()) {
        UploadCheck::Valid => {}
        UploadCheck::Expired => return Err(ApiError::Unauthorized("Upload URL expired".to_string())),
        UploadCheck::BadSignature => {
            warn!(path = %path, "Upload rejected: bad signature");
            return Err(ApiError::Unauthorized("Invalid upload signature".to_string()));
        }
    }

    let max = state.config.storage.max_upload_bytes;
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max) {
        return Err(ApiError::PayloadTooLarge(format!("Uploads are limited to {} bytes", max)));
    }

    let bytes = axum::body::to_bytes(body, max)
        .await
        .map_err(|_| ApiError::PayloadTooLarge(format!("Uploads are limited to {} bytes", max)))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Upload body is empty".to_string()));
    }

    state.storage.put(&path, &bytes).await?;
    info!(path = %path, size = bytes.len(), "Media object stored");

    Ok(Json(serde_json::json!({
        "path": path,
        "public_url": public_url(&path),
        "size": bytes.len(),
    })))
}

/// Routes that require a session
pub fn upload_url_routes() -> Router<AppState> {
    Router::new().route("/api/upload/url", post(create_upload_url))
}

/// Signature-authorized routes
pub fn object_routes() -> Router<AppState> {
    Router::new().route("/api/upload/object/*path", put(upload_object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(extension_for("audio/webm; codecs=opus"), Some("weba"));
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for("image/svg+xml"), None);
    }
}
