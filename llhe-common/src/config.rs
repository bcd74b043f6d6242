//! Configuration loading
//!
//! Resolution follows this priority order:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults
//! are used.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Public base URL used to build login links and upload URLs
    pub site_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5780,
            site_url: "http://127.0.0.1:5780".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: format!("sqlite://{}", default_data_dir().join("library.db").display()),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploaded media objects
    pub root: PathBuf,
    /// Secret used to sign upload URLs; generated at startup when empty
    pub signing_secret: String,
    pub upload_url_ttl_secs: i64,
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_data_dir().join("media"),
            signing_secret: String::new(),
            upload_url_ttl_secs: 900,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    pub login_token_ttl_minutes: i64,
    /// Accounts allowed to use the verification admin surface
    pub admin_emails: Vec<String>,
    /// Include the one-time login link in the login response (development)
    pub expose_login_link: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            login_token_ttl_minutes: 15,
            admin_emails: Vec::new(),
            expose_login_link: false,
        }
    }
}

impl AuthConfig {
    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Which implementation family backs the AI capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible hosted API (requires an API key)
    #[default]
    Hosted,
    /// OpenAI-compatible endpoints running locally, one URL per capability
    Local,
    /// Deterministic rule-based fallbacks, no network
    Rules,
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" | "openai" => Ok(ProviderKind::Hosted),
            "local" => Ok(ProviderKind::Local),
            "rules" | "fallback" | "none" => Ok(ProviderKind::Rules),
            other => Err(Error::Config(format!("Unknown AI provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub transcription_model: String,
    pub timeout_secs: u64,
    pub local: LocalEndpoints,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hosted,
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            transcription_model: "whisper-1".to_string(),
            timeout_secs: 30,
            local: LocalEndpoints::default(),
        }
    }
}

impl AiConfig {
    /// API key if present and non-blank
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| is_valid_key(k))
    }
}

/// Per-capability base URLs for the local provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalEndpoints {
    pub pii: Option<String>,
    pub classifier: Option<String>,
    pub embedding: Option<String>,
    pub transcription: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "llhe_api=info,tower_http=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML (if present) and the process environment
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(explicit_path) {
            Some(path) => Self::from_file(&path)?,
            None => {
                warn!("No config file found, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Overlay values from an environment-like lookup
    ///
    /// Invalid values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("LLHE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(site_url) = get("LLHE_SITE_URL") {
            self.server.site_url = site_url.trim_end_matches('/').to_string();
        }
        if let Some(root) = get("LLHE_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(secret) = get("LLHE_SIGNING_SECRET") {
            self.storage.signing_secret = secret;
        }
        if let Some(admins) = get("LLHE_ADMIN_EMAILS") {
            self.auth.admin_emails = admins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(provider) = get("LLHE_AI_PROVIDER") {
            match provider.parse() {
                Ok(kind) => self.ai.provider = kind,
                Err(e) => warn!("Ignoring LLHE_AI_PROVIDER: {}", e),
            }
        }
        if let Some(key) = get("LLHE_AI_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.ai.api_key = Some(key);
        }
        if let Some(base_url) = get("LLHE_AI_BASE_URL") {
            self.ai.base_url = base_url;
        }
        if let Some(url) = get("LLHE_LOCAL_PII_URL") {
            self.ai.local.pii = Some(url);
        }
        if let Some(url) = get("LLHE_LOCAL_CLASSIFIER_URL") {
            self.ai.local.classifier = Some(url);
        }
        if let Some(url) = get("LLHE_LOCAL_EMBEDDING_URL") {
            self.ai.local.embedding = Some(url);
        }
        if let Some(url) = get("LLHE_LOCAL_TRANSCRIPTION_URL") {
            self.ai.local.transcription = Some(url);
        }
    }
}

/// Validate a key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Explicit path when given, else `LLHE_CONFIG`, else the platform default
/// (`~/.config/llhe/config.toml` on Linux) if it exists
fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("LLHE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|d| d.join("llhe").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("llhe"))
        .unwrap_or_else(|| PathBuf::from("./llhe_data"))
}
