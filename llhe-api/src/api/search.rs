//! Advanced search
//!
//! POST runs a text or semantic search over the caller's fragments. GET
//! serves the side queries selected by `type`: suggestions, filters and
//! analytics.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use llhe_common::analytics;
use llhe_common::facets::{self, FacetSummary};
use llhe_common::{Fragment, Visibility};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::ai::cosine_similarity;
use crate::api::fragments::FragmentResponse;
use crate::api::AuthUser;
use crate::db::fragments;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, Pagination};
use crate::validation::JsonBody;
use crate::AppState;

/// Maximum number of suggestions returned
pub const SUGGESTION_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Text,
    Semantic,
}

/// Narrowing applied before matching
///
/// Each non-empty list keeps fragments carrying at least one listed value;
/// separate lists combine with AND. Dates bound `event_at` inclusively.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub themes: Vec<String>,
    pub emotions: Vec<String>,
    pub tags: Vec<String>,
    pub visibility: Vec<Visibility>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl SearchFilters {
    fn matches(&self, fragment: &Fragment) -> bool {
        let any_of = |wanted: &[String], have: &[String]| wanted.is_empty() || wanted.iter().any(|w| have.contains(w));

        any_of(&self.themes, &fragment.themes)
            && any_of(&self.emotions, &fragment.emotions)
            && any_of(&self.tags, &fragment.tags)
            && (self.visibility.is_empty() || self.visibility.contains(&fragment.visibility))
            && self.date_from.map_or(true, |from| fragment.event_at >= from)
            && self.date_to.map_or(true, |to| fragment.event_at <= to)
    }
}

#[derive(Debug, Deserialize)]
pub struct AdvancedSearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub mode: SearchMode,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub fragment: FragmentResponse,
    /// Cosine similarity in semantic mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    /// Facets over every match, not just this page
    pub facets: FacetSummary,
    pub pagination: Pagination,
}

fn text_matches(fragment: &Fragment, needle: &str) -> bool {
    fragment.title.to_lowercase().contains(needle)
        || fragment.content.to_lowercase().contains(needle)
        || fragment.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// POST /api/search/advanced
pub async fn advanced_search(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<AdvancedSearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Search query is required".to_string()));
    }

    let candidates: Vec<Fragment> = fragments::all_for_user(&state.db, user.id)
        .await?
        .into_iter()
        .filter(|f| req.filters.matches(f))
        .collect();

    let scored: Vec<(Fragment, Option<f32>)> = match req.mode {
        SearchMode::Text => {
            let needle = query.to_lowercase();
            candidates
                .into_iter()
                .filter(|f| text_matches(f, &needle))
                .map(|f| (f, None))
                .collect()
        }
        SearchMode::Semantic => semantic_rank(&state, query, candidates)
            .await?
            .into_iter()
            .map(|(f, s)| (f, Some(s)))
            .collect(),
    };

    let facets = facets::aggregate(scored.iter().map(|(f, _)| f));
    let pagination = calculate_pagination(scored.len() as i64, req.page, req.limit);
    let results = pagination
        .slice(scored)
        .into_iter()
        .map(|(fragment, score)| SearchHit {
            fragment: FragmentResponse::for_viewer(fragment, user.id),
            score,
        })
        .collect();

    debug!(mode = ?req.mode, total = pagination.total, "Advanced search");

    Ok(Json(SearchResponse {
        results,
        facets,
        pagination,
    }))
}

/// Score candidates against the query embedding, best first
///
/// Fragments without a compatible stored embedding are embedded on the fly
/// and the vector cached. Only positive scores are kept.
async fn semantic_rank(state: &AppState, query: &str, candidates: Vec<Fragment>) -> ApiResult<Vec<(Fragment, f32)>> {
    let query_vector = state.ai.embedder.embed(query).await?;
    let mut ranked = Vec::with_capacity(candidates.len());

    for fragment in candidates {
        let vector = match &fragment.embedding {
            Some(v) if v.len() == query_vector.len() => v.clone(),
            _ => {
                let v = state.ai.embedder.embed(&fragment.analysis_text()).await?;
                if let Err(e) = fragments::set_embedding(&state.db, fragment.id, &v).await {
                    warn!(fragment_id = %fragment.id, "Failed to cache embedding: {}", e);
                }
                v
            }
        };
        let score = cosine_similarity(&query_vector, &vector);
        if score > 0.0 {
            ranked.push((fragment, score));
        }
    }

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(ranked)
}

#[derive(Debug, Deserialize)]
pub struct SearchInfoQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub value: String,
    pub kind: &'static str,
}

/// Suggestions containing `q`, themes first, then emotions, tags and titles
pub fn suggestions(fragments: &[Fragment], q: &str) -> Vec<Suggestion> {
    let needle = q.trim().to_lowercase();
    let mut out: Vec<Suggestion> = Vec::new();
    if needle.is_empty() {
        return out;
    }

    for kind in ["theme", "emotion", "tag", "title"] {
        for fragment in fragments {
            for value in suggestion_values(fragment, kind) {
                if out.len() >= SUGGESTION_LIMIT {
                    return out;
                }
                let seen = out.iter().any(|s| s.kind == kind && s.value == value);
                if !seen && value.to_lowercase().contains(&needle) {
                    out.push(Suggestion {
                        value: value.to_string(),
                        kind,
                    });
                }
            }
        }
    }
    out
}

fn suggestion_values<'a>(fragment: &'a Fragment, kind: &str) -> Vec<&'a str> {
    let list = match kind {
        "theme" => &fragment.themes,
        "emotion" => &fragment.emotions,
        "tag" => &fragment.tags,
        _ => return vec![fragment.title.as_str()],
    };
    list.iter().map(String::as_str).collect()
}

#[derive(Debug, Serialize)]
pub struct FilterOptions {
    pub facets: FacetSummary,
    pub tags: Vec<String>,
    pub visibility_options: Vec<Visibility>,
}

/// GET /api/search/advanced?type=suggestions|filters|analytics
pub async fn search_info(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchInfoQuery>,
) -> ApiResult<Response> {
    let kind = query.kind.as_deref().unwrap_or_default();
    if !matches!(kind, "suggestions" | "filters" | "analytics") {
        return Err(ApiError::BadRequest(format!(
            "Unknown type '{}': expected suggestions, filters or analytics",
            kind
        )));
    }

    let all = fragments::all_for_user(&state.db, user.id).await?;

    let response = match kind {
        "suggestions" => {
            let q = query.q.unwrap_or_default();
            Json(serde_json::json!({ "suggestions": suggestions(&all, &q) })).into_response()
        }
        "filters" => {
            let tags: BTreeSet<String> = all.iter().flat_map(|f| f.tags.iter().cloned()).collect();
            Json(FilterOptions {
                facets: facets::aggregate(&all),
                tags: tags.into_iter().collect(),
                visibility_options: Visibility::ALL.to_vec(),
            })
            .into_response()
        }
        _ => Json(analytics::summarize(&all)).into_response(),
    };
    Ok(response)
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search/advanced", get(search_info).post(advanced_search))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn fragment(title: &str, themes: &[&str], tags: &[&str]) -> Fragment {
        let mut f = Fragment::new(
            Uuid::new_v4(),
            title.to_string(),
            "content".to_string(),
            Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap(),
            Visibility::Private,
        );
        f.themes = themes.iter().map(|s| s.to_string()).collect();
        f.tags = tags.iter().map(|s| s.to_string()).collect();
        f
    }

    #[test]
    fn test_filters_combine_lists_with_and() {
        let f = fragment("A", &["family", "loss"], &["1990s"]);
        let filters = SearchFilters {
            themes: vec!["loss".to_string(), "travel".to_string()],
            tags: vec!["1990s".to_string()],
            ..Default::default()
        };
        assert!(filters.matches(&f));

        let filters = SearchFilters {
            themes: vec!["loss".to_string()],
            tags: vec!["2000s".to_string()],
            ..Default::default()
        };
        assert!(!filters.matches(&f));
    }

    #[test]
    fn test_date_filter_bounds_event_at() {
        let f = fragment("A", &[], &[]);
        let inside = SearchFilters {
            date_from: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            date_to: Some(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(inside.matches(&f));
        let after = SearchFilters {
            date_from: Some(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        };
        assert!(!after.matches(&f));
    }

    #[test]
    fn test_text_match_is_case_insensitive() {
        let f = fragment("The Lighthouse", &[], &["Coast"]);
        assert!(text_matches(&f, "lighthouse"));
        assert!(text_matches(&f, "coast"));
        assert!(!text_matches(&f, "mountain"));
    }

    #[test]
    fn test_suggestions_are_deduplicated_and_ordered() {
        let fragments = vec![
            fragment("Family dinner", &["family"], &["family-recipes"]),
            fragment("Another", &["family"], &[]),
        ];
        let s = suggestions(&fragments, "FAM");
        assert_eq!(
            s,
            vec![
                Suggestion { value: "family".to_string(), kind: "theme" },
                Suggestion { value: "family-recipes".to_string(), kind: "tag" },
                Suggestion { value: "Family dinner".to_string(), kind: "title" },
            ]
        );
    }

    #[test]
    fn test_suggestions_capped() {
        let fragments: Vec<Fragment> = (0..15).map(|i| fragment(&format!("story {}", i), &[], &[])).collect();
        assert_eq!(suggestions(&fragments, "story").len(), SUGGESTION_LIMIT);
        assert!(suggestions(&fragments, "  ").is_empty());
    }
}
