//! llhe-api - Living Library of Human Experience service
//!
//! Serves the fragment library over HTTP: passwordless sessions, fragment
//! CRUD with PII screening, advanced search, signed uploads and
//! verification moderation.

use anyhow::Result;
use clap::Parser;
use llhe_api::ai::factory::AiFactory;
use llhe_api::storage::LocalStorage;
use llhe_api::{build_router, AppState};
use llhe_common::config::Config;
use llhe_common::db::init_database;
use llhe_common::tokens::generate_token;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "llhe-api")]
#[command(about = "Living Library of Human Experience API")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "LLHE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "LLHE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long, env = "LLHE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first so the default log filter can come from it
    let config_result = Config::load(args.config.as_deref());
    let default_filter = config_result
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    info!(
        "Starting Living Library API (llhe-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = match config_result {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    if config.storage.signing_secret.trim().is_empty() {
        warn!("No upload signing secret configured; generated one for this run (issued upload URLs end with the process)");
        config.storage.signing_secret = generate_token();
    }

    let pool = match init_database(&config.database.url, config.database.max_connections).await {
        Ok(pool) => {
            info!("✓ Connected to database");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let ai = AiFactory::from_config(&config.ai)?;
    info!(
        pii = ai.pii.provider(),
        classifier = ai.classifier.provider(),
        embedder = ai.embedder.provider(),
        transcriber = ai.transcriber.provider(),
        "AI providers selected"
    );

    tokio::fs::create_dir_all(&config.storage.root).await?;
    info!("Media root: {}", config.storage.root.display());
    let storage = Arc::new(LocalStorage::new(config.storage.root.clone()));

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let state = AppState::new(pool, config, ai, storage);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("llhe-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
