//! Domain models
//!
//! A [`Fragment`] is one personal narrative. Themes, emotions and the
//! embedding are system assigned; everything else is authored by the owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Who may read a fragment besides its owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Visibility {
    /// Owner only
    #[default]
    Private,
    /// Readable by any signed-in user, author redacted
    Anonymous,
    /// Readable by any signed-in user
    Public,
}

impl Visibility {
    pub const ALL: [Visibility; 3] = [Visibility::Private, Visibility::Anonymous, Visibility::Public];

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "PRIVATE",
            Visibility::Anonymous => "ANONYMOUS",
            Visibility::Public => "PUBLIC",
        }
    }

    /// Whether a signed-in user other than the owner may read the fragment
    pub fn is_shared(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRIVATE" => Ok(Visibility::Private),
            "ANONYMOUS" => Ok(Visibility::Anonymous),
            "PUBLIC" => Ok(Visibility::Public),
            other => Err(Error::InvalidInput(format!("Unknown visibility: {}", other))),
        }
    }
}

/// Processing status of the system-assigned analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Analysis pending or invalidated by an edit
    Processing,
    /// Themes, emotions and embedding are current
    Ready,
    /// Last analysis attempt failed
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Processing => "PROCESSING",
            Status::Ready => "READY",
            Status::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROCESSING" => Ok(Status::Processing),
            "READY" => Ok(Status::Ready),
            "FAILED" => Ok(Status::Failed),
            other => Err(Error::InvalidInput(format!("Unknown status: {}", other))),
        }
    }
}

/// Kind of an attached media object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

/// Media attachment reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

/// A personal narrative fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: Uuid,
    /// Owner; never rewritten after creation
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    /// When the narrated event happened
    pub event_at: DateTime<Utc>,
    pub visibility: Visibility,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
    pub status: Status,
    #[serde(default)]
    pub media: Vec<MediaItem>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fragment {
    /// New fragment awaiting analysis
    pub fn new(
        user_id: Uuid,
        title: String,
        content: String,
        event_at: DateTime<Utc>,
        visibility: Visibility,
    ) -> Self {
        let now = crate::time::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            content,
            event_at,
            visibility,
            tags: Vec::new(),
            themes: Vec::new(),
            emotions: Vec::new(),
            status: Status::Processing,
            media: Vec::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Text the analysis capabilities look at
    pub fn analysis_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.content)
    }

    /// Drop system-assigned analysis after a content edit
    pub fn invalidate_analysis(&mut self) {
        self.themes.clear();
        self.emotions.clear();
        self.embedding = None;
        self.status = Status::Processing;
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Directional relation between two fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub link_type: String,
    pub score: f64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Review state of a verification request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
    NeedsInfo,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "PENDING",
            VerificationStatus::Approved => "APPROVED",
            VerificationStatus::Rejected => "REJECTED",
            VerificationStatus::NeedsInfo => "NEEDS_INFO",
        }
    }

    /// Whether a reviewer may still act on the request
    pub fn is_open(&self) -> bool {
        matches!(self, VerificationStatus::Pending | VerificationStatus::NeedsInfo)
    }
}

impl FromStr for VerificationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(VerificationStatus::Pending),
            "APPROVED" => Ok(VerificationStatus::Approved),
            "REJECTED" => Ok(VerificationStatus::Rejected),
            "NEEDS_INFO" => Ok(VerificationStatus::NeedsInfo),
            other => Err(Error::InvalidInput(format!("Unknown verification status: {}", other))),
        }
    }
}

/// Request for a moderator to verify a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: Uuid,
    pub fragment_id: Uuid,
    pub requester_id: Uuid,
    pub kind: String,
    pub status: VerificationStatus,
    pub notes: Option<String>,
    pub reviewer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_serializes_uppercase() {
        let json = serde_json::to_string(&Visibility::Anonymous).unwrap();
        assert_eq!(json, "\"ANONYMOUS\"");
        let parsed: Visibility = serde_json::from_str("\"PUBLIC\"").unwrap();
        assert_eq!(parsed, Visibility::Public);
    }

    #[test]
    fn test_visibility_rejects_unknown() {
        assert!(serde_json::from_str::<Visibility>("\"FRIENDS\"").is_err());
        assert!("private".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_media_item_uses_type_key() {
        let item: MediaItem =
            serde_json::from_str(r#"{"url": "/media/a.png", "type": "image"}"#).unwrap();
        assert_eq!(item.kind, MediaKind::Image);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "image");
    }

    #[test]
    fn test_embedding_never_serialized() {
        let mut fragment = Fragment::new(
            Uuid::new_v4(),
            "Title".to_string(),
            "Body".to_string(),
            crate::time::now(),
            Visibility::Private,
        );
        fragment.embedding = Some(vec![0.5, 0.5]);
        let json = serde_json::to_value(&fragment).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["status"], "PROCESSING");
    }

    #[test]
    fn test_invalidate_analysis_resets_status() {
        let mut fragment = Fragment::new(
            Uuid::new_v4(),
            "Title".to_string(),
            "Body".to_string(),
            crate::time::now(),
            Visibility::Public,
        );
        fragment.themes = vec!["growth".to_string()];
        fragment.emotions = vec!["joy".to_string()];
        fragment.embedding = Some(vec![1.0]);
        fragment.status = Status::Ready;

        fragment.invalidate_analysis();

        assert!(fragment.themes.is_empty());
        assert!(fragment.emotions.is_empty());
        assert!(fragment.embedding.is_none());
        assert_eq!(fragment.status, Status::Processing);
    }

    #[test]
    fn test_verification_status_open_states() {
        assert!(VerificationStatus::Pending.is_open());
        assert!(VerificationStatus::NeedsInfo.is_open());
        assert!(!VerificationStatus::Approved.is_open());
        assert!(!VerificationStatus::Rejected.is_open());
        assert_eq!(
            serde_json::to_string(&VerificationStatus::NeedsInfo).unwrap(),
            "\"NEEDS_INFO\""
        );
    }
}
