//! Request validation
//!
//! Field checks collect every problem before failing, so a client sees all
//! invalid fields in one 400 response.

use axum::extract::{FromRequest, Request};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use llhe_common::{MediaItem, MediaKind, Visibility};

use crate::error::ApiError;
use crate::storage::{is_owned_path, object_path_from_url};

pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 50_000;
pub const TAGS_MAX: usize = 20;
pub const TAG_MAX_CHARS: usize = 50;
pub const MEDIA_MAX: usize = 20;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// One invalid request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL.is_match(email)
}

/// Media entry as submitted by clients; `type` is checked, not trusted
#[derive(Debug, Clone, Deserialize)]
pub struct MediaInput {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Accumulates field errors
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Trimmed title, if valid
    pub fn title(&mut self, title: &str) -> String {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            self.push("title", "Title is required");
        } else if trimmed.chars().count() > TITLE_MAX_CHARS {
            self.push("title", format!("Title must be at most {} characters", TITLE_MAX_CHARS));
        }
        trimmed.to_string()
    }

    pub fn content(&mut self, content: &str) -> String {
        if content.trim().is_empty() {
            self.push("content", "Content is required");
        } else if content.chars().count() > CONTENT_MAX_CHARS {
            self.push("content", format!("Content must be at most {} characters", CONTENT_MAX_CHARS));
        }
        content.to_string()
    }

    pub fn event_at(&mut self, value: &str) -> Option<DateTime<Utc>> {
        match llhe_common::time::parse_client(value) {
            Ok(ts) => Some(ts),
            Err(_) => {
                self.push("event_at", "Must be an RFC 3339 timestamp");
                None
            }
        }
    }

    pub fn visibility(&mut self, value: &str) -> Option<Visibility> {
        match value.trim().to_ascii_uppercase().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                self.push("visibility", "Must be one of PRIVATE, ANONYMOUS, PUBLIC");
                None
            }
        }
    }

    /// Trimmed, de-duplicated tags in submission order
    pub fn tags(&mut self, tags: &[String]) -> Vec<String> {
        let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim();
            if tag.is_empty() || cleaned.iter().any(|t| t == tag) {
                continue;
            }
            if tag.chars().count() > TAG_MAX_CHARS {
                self.push("tags", format!("Tags must be at most {} characters", TAG_MAX_CHARS));
                continue;
            }
            cleaned.push(tag.to_string());
        }
        if cleaned.len() > TAGS_MAX {
            self.push("tags", format!("At most {} tags are allowed", TAGS_MAX));
        }
        cleaned
    }

    /// Stored media must sit under the owner's object prefix
    pub fn media(&mut self, media: &[MediaInput], owner: Uuid) -> Vec<MediaItem> {
        if media.len() > MEDIA_MAX {
            self.push("media", format!("At most {} media items are allowed", MEDIA_MAX));
        }
        let mut items = Vec::with_capacity(media.len());
        for (i, entry) in media.iter().enumerate() {
            let field = format!("media[{}]", i);
            let url = entry.url.trim();
            let foreign = object_path_from_url(url).is_some_and(|path| !is_owned_path(path, owner));
            if url.is_empty() {
                self.push(&field, "url is required");
            } else if foreign {
                self.push(&field, "Media must be uploaded by the fragment owner");
            }
            let kind = match entry.kind.as_str() {
                "image" => Some(MediaKind::Image),
                "audio" => Some(MediaKind::Audio),
                "video" => Some(MediaKind::Video),
                _ => {
                    self.push(&field, "type must be one of image, audio, video");
                    None
                }
            };
            if let (false, false, Some(kind)) = (url.is_empty(), foreign, kind) {
                items.push(MediaItem {
                    url: url.to_string(),
                    kind,
                });
            }
        }
        items
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// JSON body extractor whose rejections are 400 `ApiError`s
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}
