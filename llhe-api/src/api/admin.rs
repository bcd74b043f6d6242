//! Verification moderation
//!
//! Restricted to accounts named in `auth.admin_emails`.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use llhe_common::models::{VerificationRequest, VerificationStatus};
use llhe_common::time::now;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::api::AuthUser;
use crate::db::{audit, verification};
use crate::error::{ApiError, ApiResult};
use crate::validation::JsonBody;
use crate::AppState;

fn require_admin(state: &AppState, user: &AuthUser) -> ApiResult<()> {
    if state.config.auth.is_admin(&user.email) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Admin access required".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListVerificationQuery {
    pub status: Option<String>,
}

/// GET /api/admin/verification
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListVerificationQuery>,
) -> ApiResult<Json<Value>> {
    require_admin(&state, &user)?;

    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.to_ascii_uppercase()
                .parse::<VerificationStatus>()
                .map_err(|_| ApiError::BadRequest(format!("Unknown status: {}", s)))?,
        ),
        None => None,
    };

    let requests = verification::list(&state.db, status).await?;
    Ok(Json(json!({ "requests": requests })))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    RequestInfo,
}

impl ReviewAction {
    pub fn status(self) -> VerificationStatus {
        match self {
            ReviewAction::Approve => VerificationStatus::Approved,
            ReviewAction::Reject => VerificationStatus::Rejected,
            ReviewAction::RequestInfo => VerificationStatus::NeedsInfo,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::RequestInfo => "request_info",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub id: Uuid,
    pub action: ReviewAction,
    pub notes: Option<String>,
}

/// PATCH /api/admin/verification
pub async fn review_request(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<ReviewRequest>,
) -> ApiResult<Json<VerificationRequest>> {
    require_admin(&state, &user)?;

    let existing = verification::get(&state.db, req.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Verification request not found: {}", req.id)))?;
    if !existing.status.is_open() {
        return Err(ApiError::BadRequest(format!(
            "Verification request already {}",
            existing.status.as_str()
        )));
    }

    let notes = req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let status = req.action.status();
    if !verification::decide(&state.db, req.id, status, user.id, notes, now()).await? {
        // Decided concurrently between the read and the write
        return Err(ApiError::BadRequest("Verification request already decided".to_string()));
    }

    audit::record(
        &state.db,
        user.id,
        &format!("verification.{}", req.action.as_str()),
        "verification_request",
        req.id,
        json!({ "fragment_id": existing.fragment_id, "status": status.as_str() }),
    )
    .await?;

    info!(request_id = %req.id, reviewer = %user.id, status = status.as_str(), "Verification reviewed");

    let updated = verification::get(&state.db, req.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Verification request not found: {}", req.id)))?;
    Ok(Json(updated))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/verification", get(list_requests).patch(review_request))
}
