//! OpenAI-compatible HTTP client
//!
//! Serves both the hosted API and local endpoints speaking the same wire
//! format (chat completions, embeddings, audio transcriptions).

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{AiError, Classification, Classifier, Embedder, PiiDetection, PiiDetector, Transcriber};

const USER_AGENT: &str = concat!("llhe/", env!("CARGO_PKG_VERSION"));

const PII_PROMPT: &str = "You detect personal information in personal narratives. \
Return JSON of the form {\"detections\": [{\"kind\": string, \"text\": string, \"start\": int, \"end\": int, \"confidence\": number}]}. \
kind is one of email, phone, address, ssn, credit_card, full_name, date_of_birth. \
start and end are byte offsets of text in the input. Return an empty list when nothing is found.";

const CLASSIFY_PROMPT: &str = "You label personal narratives. \
Return JSON of the form {\"themes\": [string], \"emotions\": [string]} using short lowercase words \
(themes such as family, growth, loss, work; emotions such as joy, sadness, hope). At most five of each.";

/// Model names used per endpoint
#[derive(Debug, Clone)]
pub struct Models {
    pub chat: String,
    pub embedding: String,
    pub transcription: String,
}

/// Client for one OpenAI-compatible base URL
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    models: Models,
    label: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct DetectionsPayload {
    #[serde(default)]
    detections: Vec<PiiDetection>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl OpenAiClient {
    /// Client for the hosted API
    pub fn hosted(base_url: &str, api_key: &str, models: Models, timeout: Duration) -> Result<Self, AiError> {
        Self::build(base_url, Some(api_key.to_string()), models, timeout, "hosted")
    }

    /// Client for a local endpoint (no key)
    pub fn local(base_url: &str, models: Models, timeout: Duration) -> Result<Self, AiError> {
        Self::build(base_url, None, models, timeout, "local")
    }

    fn build(
        base_url: &str,
        api_key: Option<String>,
        models: Models,
        timeout: Duration,
        label: &'static str,
    ) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            models,
            label,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.http.post(self.endpoint(path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Map non-success statuses; 429 and 5xx mean "try again later"
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(AiError::Unavailable(format!("{}: {}", status, body)))
        } else {
            Err(AiError::Provider(status.as_u16(), body))
        }
    }

    /// Run a JSON-mode chat completion and return the message content
    async fn chat_json(&self, system: &str, user: &str) -> Result<String, AiError> {
        let body = json!({
            "model": self.models.chat,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        debug!(provider = self.label, model = %self.models.chat, "Chat completion request");
        let response = Self::check(self.request("chat/completions").json(&body).send().await?).await?;
        let chat: ChatResponse = response.json().await?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Parse("Empty completion".to_string()))
    }
}

/// Re-anchor a model-reported detection on the actual input
///
/// Models often miscount offsets; when the reported span does not contain
/// the reported text, the first occurrence of the text is used instead.
fn anchor(text: &str, mut detection: PiiDetection) -> PiiDetection {
    let matches_span = text
        .get(detection.start..detection.end)
        .is_some_and(|span| span == detection.text);
    if !matches_span {
        if let Some(pos) = text.find(&detection.text) {
            detection.start = pos;
            detection.end = pos + detection.text.len();
        }
    }
    detection
}

#[async_trait::async_trait]
impl PiiDetector for OpenAiClient {
    fn provider(&self) -> &'static str {
        self.label
    }

    async fn detect(&self, text: &str) -> Result<Vec<PiiDetection>, AiError> {
        let content = self.chat_json(PII_PROMPT, text).await?;
        let payload: DetectionsPayload =
            serde_json::from_str(&content).map_err(|e| AiError::Parse(e.to_string()))?;

        let mut detections: Vec<PiiDetection> = payload
            .detections
            .into_iter()
            .filter(|d| !d.text.is_empty())
            .map(|d| anchor(text, d))
            .collect();
        detections.sort_by_key(|d| d.start);
        Ok(detections)
    }
}

#[async_trait::async_trait]
impl Classifier for OpenAiClient {
    fn provider(&self) -> &'static str {
        self.label
    }

    async fn classify(&self, text: &str) -> Result<Classification, AiError> {
        let content = self.chat_json(CLASSIFY_PROMPT, text).await?;
        let mut classification: Classification =
            serde_json::from_str(&content).map_err(|e| AiError::Parse(e.to_string()))?;

        for list in [&mut classification.themes, &mut classification.emotions] {
            *list = list
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            list.dedup();
        }
        Ok(classification)
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAiClient {
    fn provider(&self) -> &'static str {
        self.label
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AiError> {
        let body = EmbeddingRequest {
            model: &self.models.embedding,
            input: text,
        };
        debug!(provider = self.label, model = %self.models.embedding, "Embedding request");
        let response = Self::check(self.request("embeddings").json(&body).send().await?).await?;
        let parsed: EmbeddingResponse = response.json().await?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AiError::Parse("Empty embedding".to_string()))
    }
}

#[async_trait::async_trait]
impl Transcriber for OpenAiClient {
    fn provider(&self) -> &'static str {
        self.label
    }

    async fn transcribe(&self, audio: Vec<u8>, file_name: &str, content_type: &str) -> Result<String, AiError> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| AiError::Parse(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.models.transcription.clone())
            .part("file", part);

        debug!(provider = self.label, model = %self.models.transcription, "Transcription request");
        let response = Self::check(self.request("audio/transcriptions").multipart(form).send().await?).await?;
        let parsed: TranscriptionResponse = response.json().await?;
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models() -> Models {
        Models {
            chat: "chat".to_string(),
            embedding: "embed".to_string(),
            transcription: "whisper".to_string(),
        }
    }

    fn detection(text: &str, start: usize, end: usize) -> PiiDetection {
        PiiDetection {
            kind: "email".to_string(),
            text: text.to_string(),
            start,
            end,
            confidence: 0.8,
        }
    }

    #[test]
    fn test_anchor_keeps_correct_offsets() {
        let input = "Contact me at user@example.com";
        let d = anchor(input, detection("user@example.com", 14, 30));
        assert_eq!((d.start, d.end), (14, 30));
    }

    #[test]
    fn test_anchor_repairs_wrong_offsets() {
        let input = "Contact me at user@example.com";
        let d = anchor(input, detection("user@example.com", 0, 16));
        assert_eq!((d.start, d.end), (14, 30));
    }

    #[test]
    fn test_anchor_tolerates_out_of_range() {
        let input = "short";
        let d = anchor(input, detection("missing", 50, 90));
        assert_eq!((d.start, d.end), (50, 90));
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let client = OpenAiClient::local("http://localhost:11434/v1/", models(), Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("embeddings"), "http://localhost:11434/v1/embeddings");
        assert_eq!(PiiDetector::provider(&client), "local");
    }

    #[test]
    fn test_detections_payload_defaults_confidence() {
        let payload: DetectionsPayload = serde_json::from_str(
            r#"{"detections": [{"kind": "phone", "text": "555-0100", "start": 3, "end": 11}]}"#,
        )
        .unwrap();
        assert_eq!(payload.detections[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let client = OpenAiClient::local("http://127.0.0.1:9", models(), Duration::from_millis(500)).unwrap();
        let err = client.embed("hello").await.unwrap_err();
        assert!(matches!(err, AiError::Unavailable(_)));
    }
}
