//! Media object storage
//!
//! Objects are addressed by a relative path (`<user_id>/<uuid>.<ext>`) and
//! exposed to clients as `/media/<path>`.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use tracing::debug;

/// URL prefix under which stored objects are served
pub const MEDIA_URL_PREFIX: &str = "/media/";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object store used for fragment media
#[async_trait::async_trait]
pub trait MediaStorage: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed storage rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an object path under the root, rejecting traversal
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or_io(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait::async_trait]
impl MediaStorage for LocalStorage {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(path, size = bytes.len(), "Stored media object");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| not_found_or_io(path, e))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| not_found_or_io(path, e))?;
        debug!(path, "Deleted media object");
        Ok(())
    }
}

/// Object path of a media URL served by this service
///
/// Accepts both `/media/<path>` and absolute `<site>/media/<path>` forms;
/// returns `None` for URLs that point elsewhere.
pub fn object_path_from_url(url: &str) -> Option<&str> {
    let idx = url.find(MEDIA_URL_PREFIX)?;
    let path = &url[idx + MEDIA_URL_PREFIX.len()..];
    let path = path.split(['?', '#']).next().unwrap_or(path);
    (!path.is_empty()).then_some(path)
}

/// Whether an object path lives under the owner's `<user_id>/` prefix
pub fn is_owned_path(path: &str, owner: Uuid) -> bool {
    path.strip_prefix(owner.to_string().as_str())
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}

/// Public URL of an object path
pub fn public_url(path: &str) -> String {
    format!("{}{}", MEDIA_URL_PREFIX, path)
}
