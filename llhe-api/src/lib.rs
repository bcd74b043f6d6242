//! llhe-api library - Living Library HTTP service
//!
//! Exposes the router and state for the binary and integration tests.

pub mod ai;
pub mod api;
pub mod db;
pub mod error;
pub mod mailer;
pub mod pagination;
pub mod storage;
pub mod validation;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use llhe_common::config::Config;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::ai::AiServices;
use crate::mailer::{LinkSender, LogLinkSender};
use crate::storage::MediaStorage;

/// Application state shared across handlers
///
/// Immutable after startup; cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub ai: AiServices,
    pub storage: Arc<dyn MediaStorage>,
    pub link_sender: Arc<dyn LinkSender>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config, ai: AiServices, storage: Arc<dyn MediaStorage>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            ai,
            storage,
            link_sender: Arc::new(LogLinkSender),
            startup_time: Utc::now(),
        }
    }

    pub fn with_link_sender(mut self, link_sender: Arc<dyn LinkSender>) -> Self {
        self.link_sender = link_sender;
        self
    }
}

/// Build application router
///
/// Health, login, callback and signed object uploads are public; everything
/// else sits behind the session gate.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::auth::session_routes())
        .merge(api::fragments::fragment_routes())
        .merge(api::search::search_routes())
        .merge(api::upload::upload_url_routes())
        .merge(api::transcribe::transcribe_routes())
        .merge(api::admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), api::auth::require_auth));

    let public = Router::new()
        .merge(api::health::health_routes())
        .merge(api::auth::login_routes())
        .merge(api::upload::object_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .nest_service("/media", ServeDir::new(&state.config.storage.root))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
