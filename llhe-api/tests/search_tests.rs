//! Integration tests for advanced search

mod helpers;

use async_trait::async_trait;
use axum::http::StatusCode;
use helpers::*;
use llhe_api::ai::{AiError, AiServices, Embedder};
use llhe_api::db::fragments;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Embedder whose provider is unreachable
struct DownEmbedder;

#[async_trait]
impl Embedder for DownEmbedder {
    fn provider(&self) -> &'static str {
        "stub"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, AiError> {
        Err(AiError::Unavailable("connection refused".to_string()))
    }
}

async fn seed(app: &TestApp, token: &str) -> Vec<Value> {
    let stories = [
        ("Baking with grandmother", "My grandmother and I would bake bread every Sunday.", "2001-03-01T00:00:00Z", &["kitchen"][..]),
        ("First job", "My boss at the office hired me on the spot.", "2010-09-15T00:00:00Z", &["career"][..]),
        ("Road trip", "We took a trip across the country in an old van.", "2015-06-20T00:00:00Z", &["travel", "van"][..]),
    ];

    let mut created = Vec::new();
    for (title, content, event_at, tags) in stories {
        let body = json!({"title": title, "content": content, "event_at": event_at, "tags": tags});
        let fragment = create_fragment(app, token, body).await;
        let uri = format!("/api/fragments/{}/analyze", fragment["id"].as_str().unwrap());
        let response = send(app, json_request("POST", &uri, Some(token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        created.push(body_json(response).await);
    }
    created
}

async fn search(app: &TestApp, token: &str, body: Value) -> (StatusCode, Value) {
    let response = send(app, json_request("POST", "/api/search/advanced", Some(token), Some(body))).await;
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_text_search_with_facets() {
    let app = test_app().await;
    let (_, token) = create_user_session(&app.state, "writer@example.com").await;
    seed(&app, &token).await;

    let (status, body) = search(&app, &token, json!({"query": "GRANDMOTHER"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["results"][0]["title"], "Baking with grandmother");
    assert!(body["results"][0].get("score").is_none());

    assert_eq!(body["facets"]["theme_counts"]["family"], 1);
    assert!(body["facets"]["theme_counts"].get("work").is_none());
}

#[tokio::test]
async fn test_filters_narrow_results() {
    let app = test_app().await;
    let (_, token) = create_user_session(&app.state, "writer@example.com").await;
    seed(&app, &token).await;

    // "my" appears in two stories; the date window keeps one
    let body = json!({
        "query": "my",
        "filters": {"date_from": "2005-01-01T00:00:00Z", "date_to": "2012-01-01T00:00:00Z"},
    });
    let (_, body) = search(&app, &token, body).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["results"][0]["title"], "First job");

    let body = json!({"query": "trip", "filters": {"tags": ["kitchen"]}});
    let (_, body) = search(&app, &token, body).await;
    assert_eq!(body["pagination"]["total"], 0);

    let body = json!({"query": "o", "filters": {"themes": ["travel", "work"]}, "limit": 1});
    let (_, body) = search(&app, &token, body).await;
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_semantic_search_ranks_closest_first() {
    let app = test_app().await;
    let (user, token) = create_user_session(&app.state, "writer@example.com").await;
    let seeded = seed(&app, &token).await;

    // Incompatible cached vector is recomputed and stored
    let trip_id = Uuid::parse_str(seeded[2]["id"].as_str().unwrap()).unwrap();
    let mut trip = fragments::get(&app.state.db, trip_id).await.unwrap().unwrap();
    trip.embedding = Some(vec![1.0, 0.0]);
    fragments::update_owned(&app.state.db, &trip).await.unwrap();

    let body = json!({"query": "trip across the country in a van", "mode": "semantic"});
    let (status, body) = search(&app, &token, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["title"], "Road trip");
    assert!(body["results"][0]["score"].as_f64().unwrap() > 0.0);

    let trip = fragments::get(&app.state.db, trip_id).await.unwrap().unwrap();
    assert_ne!(trip.embedding.map(|e| e.len()), Some(2));

    let all = fragments::all_for_user(&app.state.db, user.id).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_semantic_search_provider_outage() {
    let app = test_app_with(AiServices::rules().with_embedder(Arc::new(DownEmbedder)), None).await;
    let (_, token) = create_user_session(&app.state, "writer@example.com").await;
    create_fragment(&app, &token, fragment_body("Road trip", "We drove across the country.")).await;

    let (status, body) = search(&app, &token, json!({"query": "road trip", "mode": "semantic"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");

    // Text mode never touches the embedder
    let (status, body) = search(&app, &token, json!({"query": "road trip"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let app = test_app().await;
    let (_, token) = create_user_session(&app.state, "writer@example.com").await;

    let (status, _) = search(&app, &token, json!({"query": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = search(&app, &token, json!({"query": "x", "mode": "psychic"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_only_sees_own_fragments() {
    let app = test_app().await;
    let (_, token) = create_user_session(&app.state, "writer@example.com").await;
    let (_, other_token) = create_user_session(&app.state, "other@example.com").await;
    seed(&app, &token).await;

    let (_, body) = search(&app, &other_token, json!({"query": "grandmother"})).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_search_info_types() {
    let app = test_app().await;
    let (_, token) = create_user_session(&app.state, "writer@example.com").await;
    seed(&app, &token).await;

    let get = |uri: &str| json_request("GET", uri, Some(&token), None);

    let response = send(&app, get("/api/search/advanced?type=suggestions&q=tra")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let suggestions = body["suggestions"].as_array().unwrap();
    assert_eq!(suggestions[0], json!({"value": "travel", "kind": "theme"}));

    let response = send(&app, get("/api/search/advanced?type=filters")).await;
    let body = body_json(response).await;
    assert_eq!(body["tags"], json!(["career", "kitchen", "travel", "van"]));
    assert_eq!(body["visibility_options"], json!(["PRIVATE", "ANONYMOUS", "PUBLIC"]));

    let response = send(&app, get("/api/search/advanced?type=analytics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total_fragments"], 3);

    let response = send(&app, get("/api/search/advanced?type=everything")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
