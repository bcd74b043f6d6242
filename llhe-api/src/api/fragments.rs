//! Fragment lifecycle routes
//!
//! Owners have full access to their fragments. Other signed-in users may
//! read PUBLIC and ANONYMOUS fragments; everything else looks missing to
//! them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use llhe_common::models::{VerificationRequest, VerificationStatus};
use llhe_common::time::now;
use llhe_common::{Fragment, Link, MediaItem, Status, Visibility};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::AuthUser;
use crate::db::fragments::FragmentFilter;
use crate::db::{audit, fragments, links, verification};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Pagination};
use crate::storage::{is_owned_path, object_path_from_url};
use crate::validation::{JsonBody, MediaInput, Validator};
use crate::AppState;

/// Fragment as returned to clients
///
/// `user_id` is `None` when an ANONYMOUS fragment is read by someone other
/// than its owner.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    pub event_at: DateTime<Utc>,
    pub visibility: Visibility,
    pub tags: Vec<String>,
    pub themes: Vec<String>,
    pub emotions: Vec<String>,
    pub status: Status,
    pub media: Vec<MediaItem>,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FragmentResponse {
    pub fn for_viewer(fragment: Fragment, viewer: Uuid) -> Self {
        let is_owner = fragment.is_owned_by(viewer);
        let user_id = if is_owner || fragment.visibility != Visibility::Anonymous {
            Some(fragment.user_id)
        } else {
            None
        };
        Self {
            id: fragment.id,
            user_id,
            title: fragment.title,
            content: fragment.content,
            event_at: fragment.event_at,
            visibility: fragment.visibility,
            tags: fragment.tags,
            themes: fragment.themes,
            emotions: fragment.emotions,
            status: fragment.status,
            media: fragment.media,
            is_owner,
            created_at: fragment.created_at,
            updated_at: fragment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FragmentDetail {
    #[serde(flatten)]
    pub fragment: FragmentResponse,
    pub outbound_links: Vec<Link>,
    pub inbound_links: Vec<Link>,
}

#[derive(Debug, Serialize)]
pub struct FragmentList {
    pub fragments: Vec<FragmentResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub q: Option<String>,
    pub visibility: Option<String>,
    pub tag: Option<String>,
    pub theme: Option<String>,
    pub emotion: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFragmentRequest {
    pub title: String,
    pub content: String,
    pub event_at: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaInput>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateFragmentRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub event_at: Option<String>,
    pub visibility: Option<String>,
    pub tags: Option<Vec<String>>,
    pub media: Option<Vec<MediaInput>>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationFiling {
    pub kind: String,
    #[serde(default)]
    pub notes: Option<String>,
}

fn parse_fragment_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Fragment not found".to_string()))
}

/// Load a fragment the caller owns: 404 when missing, 403 when foreign
async fn load_owned(state: &AppState, id: Uuid, user: &AuthUser) -> ApiResult<Fragment> {
    let fragment = fragments::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Fragment not found".to_string()))?;
    if !fragment.is_owned_by(user.id) {
        return Err(ApiError::Forbidden("Fragment belongs to another user".to_string()));
    }
    Ok(fragment)
}

/// Reject text containing personal information
///
/// Title and content are analyzed as one text so detection offsets refer to
/// `title + "\n\n" + content`.
async fn reject_pii(state: &AppState, title: &str, content: &str) -> ApiResult<()> {
    let text = format!("{}\n\n{}", title, content);
    let detections = state.ai.pii.detect(&text).await?;
    if detections.is_empty() {
        Ok(())
    } else {
        info!(count = detections.len(), provider = state.ai.pii.provider(), "Rejected text with personal information");
        Err(ApiError::PiiDetected(detections))
    }
}

/// GET /api/fragments
pub async fn list_fragments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<FragmentList>> {
    let visibility = match query.visibility.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Some(v.to_ascii_uppercase().parse::<Visibility>()?),
        None => None,
    };
    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let filter = FragmentFilter {
        q: non_empty(query.q),
        visibility,
        tag: non_empty(query.tag),
        theme: non_empty(query.theme),
        emotion: non_empty(query.emotion),
    };

    let total = fragments::count_for_user(&state.db, user.id, &filter).await?;
    let pagination = calculate_pagination(total, query.page, query.limit);
    let page = fragments::list_for_user(&state.db, user.id, &filter, pagination.limit, pagination.offset).await?;

    Ok(Json(FragmentList {
        fragments: page
            .into_iter()
            .map(|f| FragmentResponse::for_viewer(f, user.id))
            .collect(),
        pagination,
    }))
}

/// POST /api/fragments
pub async fn create_fragment(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateFragmentRequest>,
) -> ApiResult<(StatusCode, Json<FragmentResponse>)> {
    let mut v = Validator::new();
    let title = v.title(&req.title);
    let content = v.content(&req.content);
    let event_at = v.event_at(&req.event_at);
    let visibility = match req.visibility.as_deref() {
        Some(raw) => v.visibility(raw),
        None => Some(Visibility::default()),
    };
    let tags = v.tags(&req.tags);
    let media = v.media(&req.media, user.id);
    v.finish()?;

    reject_pii(&state, &title, &content).await?;

    let (Some(event_at), Some(visibility)) = (event_at, visibility) else {
        return Err(ApiError::Internal("Validated fields missing".to_string()));
    };
    let mut fragment = Fragment::new(user.id, title, content, event_at, visibility);
    fragment.tags = tags;
    fragment.media = media;

    fragments::insert(&state.db, &fragment).await?;
    info!(fragment_id = %fragment.id, user_id = %user.id, "Fragment created");

    Ok((StatusCode::CREATED, Json(FragmentResponse::for_viewer(fragment, user.id))))
}

/// GET /api/fragments/:id
pub async fn get_fragment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<FragmentDetail>> {
    let id = parse_fragment_id(&id)?;
    let fragment = fragments::get(&state.db, id)
        .await?
        .filter(|f| f.is_owned_by(user.id) || f.visibility.is_shared())
        .ok_or_else(|| ApiError::NotFound("Fragment not found".to_string()))?;

    let outbound = links::outbound(&state.db, id).await?;
    let inbound = links::inbound(&state.db, id).await?;
    let outbound_links = visible_links(&state, outbound, user.id, |l| l.target_id).await?;
    let inbound_links = visible_links(&state, inbound, user.id, |l| l.source_id).await?;

    Ok(Json(FragmentDetail {
        fragment: FragmentResponse::for_viewer(fragment, user.id),
        outbound_links,
        inbound_links,
    }))
}

/// Keep links whose far endpoint the viewer may read
async fn visible_links(
    state: &AppState,
    all: Vec<Link>,
    viewer: Uuid,
    far_end: impl Fn(&Link) -> Uuid,
) -> ApiResult<Vec<Link>> {
    let mut visible = Vec::with_capacity(all.len());
    for link in all {
        let readable = fragments::get(&state.db, far_end(&link))
            .await?
            .is_some_and(|f| f.is_owned_by(viewer) || f.visibility.is_shared());
        if readable {
            visible.push(link);
        }
    }
    Ok(visible)
}

/// PUT /api/fragments/:id
pub async fn update_fragment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateFragmentRequest>,
) -> ApiResult<Json<FragmentResponse>> {
    let id = parse_fragment_id(&id)?;
    let mut fragment = load_owned(&state, id, &user).await?;

    let mut v = Validator::new();
    let title = req.title.as_deref().map(|t| v.title(t));
    let content = req.content.as_deref().map(|c| v.content(c));
    let event_at = req.event_at.as_deref().map(|e| v.event_at(e));
    let visibility = req.visibility.as_deref().map(|raw| v.visibility(raw));
    let tags = req.tags.as_deref().map(|t| v.tags(t));
    let media = req.media.as_deref().map(|m| v.media(m, user.id));
    v.finish()?;

    let text_changed = title.as_ref().is_some_and(|t| *t != fragment.title)
        || content.as_ref().is_some_and(|c| *c != fragment.content);

    if let Some(title) = title {
        fragment.title = title;
    }
    if let Some(content) = content {
        fragment.content = content;
    }
    if let Some(Some(event_at)) = event_at {
        fragment.event_at = event_at;
    }
    if let Some(Some(visibility)) = visibility {
        fragment.visibility = visibility;
    }
    if let Some(tags) = tags {
        fragment.tags = tags;
    }
    if let Some(media) = media {
        fragment.media = media;
    }

    if text_changed {
        reject_pii(&state, &fragment.title, &fragment.content).await?;
        fragment.invalidate_analysis();
        debug!(fragment_id = %id, "Text changed, analysis invalidated");
    }
    fragment.updated_at = now();

    if !fragments::update_owned(&state.db, &fragment).await? {
        return Err(ApiError::NotFound("Fragment not found".to_string()));
    }
    info!(fragment_id = %id, "Fragment updated");

    Ok(Json(FragmentResponse::for_viewer(fragment, user.id)))
}

/// DELETE /api/fragments/:id
///
/// Media objects are removed first, one at a time; a failed removal is
/// logged and counted but does not stop the deletion.
pub async fn delete_fragment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_fragment_id(&id)?;
    let fragment = load_owned(&state, id, &user).await?;

    let mut media_failures = 0usize;
    for item in &fragment.media {
        let Some(path) = object_path_from_url(&item.url) else {
            debug!(url = %item.url, "Skipping media not held in storage");
            continue;
        };
        if !is_owned_path(path, user.id) {
            warn!(fragment_id = %id, path, "Skipping media outside the owner's prefix");
            continue;
        }
        if let Err(e) = state.storage.delete(path).await {
            media_failures += 1;
            warn!(fragment_id = %id, path, "Failed to delete media object: {}", e);
        }
    }

    let links_removed = links::delete_for_fragment(&state.db, id).await?;
    if !fragments::delete_owned(&state.db, id, user.id).await? {
        return Err(ApiError::NotFound("Fragment not found".to_string()));
    }

    audit::record(
        &state.db,
        user.id,
        "fragment.deleted",
        "fragment",
        id,
        json!({
            "title": fragment.title,
            "media_total": fragment.media.len(),
            "media_failures": media_failures,
            "links_removed": links_removed,
        }),
    )
    .await?;
    info!(fragment_id = %id, media_failures, "Fragment deleted");

    Ok(Json(json!({
        "success": true,
        "media_failures": media_failures,
    })))
}

/// POST /api/fragments/:id/analyze
///
/// Assigns themes, emotions and the embedding, then marks the fragment READY.
pub async fn analyze_fragment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<FragmentResponse>> {
    let id = parse_fragment_id(&id)?;
    let mut fragment = load_owned(&state, id, &user).await?;
    let text = fragment.analysis_text();

    let classification = state.ai.classifier.classify(&text).await?;
    let embedding = state.ai.embedder.embed(&text).await?;

    fragment.themes = classification.themes;
    fragment.emotions = classification.emotions;
    fragment.embedding = Some(embedding);
    fragment.status = Status::Ready;

    if !fragments::update_owned(&state.db, &fragment).await? {
        return Err(ApiError::NotFound("Fragment not found".to_string()));
    }
    info!(
        fragment_id = %id,
        classifier = state.ai.classifier.provider(),
        embedder = state.ai.embedder.provider(),
        themes = fragment.themes.len(),
        "Fragment analyzed"
    );

    Ok(Json(FragmentResponse::for_viewer(fragment, user.id)))
}

/// POST /api/fragments/:id/verification
pub async fn request_verification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<VerificationFiling>,
) -> ApiResult<(StatusCode, Json<VerificationRequest>)> {
    let id = parse_fragment_id(&id)?;
    let fragment = load_owned(&state, id, &user).await?;

    let kind = req.kind.trim();
    if kind.is_empty() || kind.chars().count() > 50 {
        return Err(ApiError::BadRequest("kind must be 1 to 50 characters".to_string()));
    }

    let request = VerificationRequest {
        id: Uuid::new_v4(),
        fragment_id: fragment.id,
        requester_id: user.id,
        kind: kind.to_string(),
        status: VerificationStatus::Pending,
        notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        reviewer_id: None,
        created_at: now(),
        reviewed_at: None,
    };
    verification::insert(&state.db, &request).await?;
    audit::record(
        &state.db,
        user.id,
        "verification.requested",
        "verification_request",
        request.id,
        json!({ "fragment_id": fragment.id, "kind": request.kind }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

/// Build fragment routes
pub fn fragment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/fragments", get(list_fragments).post(create_fragment))
        .route(
            "/api/fragments/:id",
            get(get_fragment).put(update_fragment).delete(delete_fragment),
        )
        .route("/api/fragments/:id/analyze", post(analyze_fragment))
        .route("/api/fragments/:id/verification", post(request_verification))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(visibility: Visibility) -> Fragment {
        Fragment::new(Uuid::new_v4(), "t".to_string(), "c".to_string(), now(), visibility)
    }

    #[test]
    fn test_anonymous_fragment_redacted_for_others() {
        let f = fragment(Visibility::Anonymous);
        let owner = f.user_id;

        assert_eq!(FragmentResponse::for_viewer(f.clone(), owner).user_id, Some(owner));
        let other = FragmentResponse::for_viewer(f, Uuid::new_v4());
        assert_eq!(other.user_id, None);
        assert!(!other.is_owner);
    }

    #[test]
    fn test_public_fragment_keeps_author() {
        let f = fragment(Visibility::Public);
        let owner = f.user_id;
        assert_eq!(FragmentResponse::for_viewer(f, Uuid::new_v4()).user_id, Some(owner));
    }

    #[test]
    fn test_response_never_contains_embedding() {
        let mut f = fragment(Visibility::Private);
        f.embedding = Some(vec![1.0, 2.0]);
        let owner = f.user_id;
        let json = serde_json::to_value(FragmentResponse::for_viewer(f, owner)).unwrap();
        assert!(json.get("embedding").is_none());
    }
}
