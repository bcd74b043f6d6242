//! AI-assisted analysis capabilities
//!
//! Each capability is a trait with one implementation per provider:
//! - `hosted`: OpenAI-compatible HTTP API ([`openai::OpenAiClient`])
//! - `local`: the same wire format against a per-capability local endpoint
//! - `rules`: deterministic rule-based fallbacks ([`rules`])
//!
//! [`factory::AiFactory`] selects an implementation per capability from
//! configuration. The resulting [`AiServices`] bundle is built once at
//! startup and carried in `AppState`.

pub mod factory;
pub mod openai;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub use factory::AiFactory;

/// AI capability errors
#[derive(Debug, Error)]
pub enum AiError {
    /// Capability has no usable provider (e.g. rule-based transcription)
    #[error("{0} is not available with the configured provider")]
    NotConfigured(&'static str),

    /// Provider could not be reached, timed out, or is overloaded
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Provider answered with an error status
    #[error("Provider error {0}: {1}")]
    Provider(u16, String),

    /// Provider answered with something we could not interpret
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AiError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            AiError::Provider(status.as_u16(), err.to_string())
        } else {
            AiError::Unavailable(err.to_string())
        }
    }
}

/// One detected piece of personal information
///
/// `start`/`end` are byte offsets into the analyzed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiDetection {
    pub kind: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    1.0
}

/// Themes and emotions assigned to a text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub emotions: Vec<String>,
}

/// Finds personal information (emails, phone numbers, ...) in text
#[async_trait::async_trait]
pub trait PiiDetector: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn detect(&self, text: &str) -> Result<Vec<PiiDetection>, AiError>;
}

/// Assigns themes and emotions to a narrative
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn classify(&self, text: &str) -> Result<Classification, AiError>;
}

/// Maps text to a dense vector for similarity search
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError>;
}

/// Converts recorded audio into text
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    fn provider(&self) -> &'static str;

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<String, AiError>;
}

/// The selected implementation of every capability
#[derive(Clone)]
pub struct AiServices {
    pub pii: Arc<dyn PiiDetector>,
    pub classifier: Arc<dyn Classifier>,
    pub embedder: Arc<dyn Embedder>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl AiServices {
    /// Rule-based implementations for every capability
    pub fn rules() -> Self {
        Self {
            pii: Arc::new(rules::RegexPiiDetector),
            classifier: Arc::new(rules::KeywordClassifier),
            embedder: Arc::new(rules::HashingEmbedder::default()),
            transcriber: Arc::new(rules::NoTranscriber),
        }
    }

    pub fn with_pii(mut self, pii: Arc<dyn PiiDetector>) -> Self {
        self.pii = pii;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }
}

impl std::fmt::Debug for AiServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiServices")
            .field("pii", &self.pii.provider())
            .field("classifier", &self.classifier.provider())
            .field("embedder", &self.embedder.provider())
            .field("transcriber", &self.transcriber.provider())
            .finish()
    }
}

/// Cosine similarity of two vectors; 0.0 when lengths differ or either is zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_rules_bundle_providers() {
        let services = AiServices::rules();
        assert_eq!(services.pii.provider(), "rules");
        assert_eq!(services.transcriber.provider(), "rules");
        assert!(format!("{:?}", services).contains("rules"));
    }
}
