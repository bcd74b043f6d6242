//! Transcription of uploaded audio

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::storage::is_owned_path;
use crate::validation::JsonBody;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub provider: &'static str,
}

/// Content type for the transcriber, guessed from the object extension
pub fn audio_content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "weba" => "audio/webm",
        "webm" => "video/webm",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// POST /api/transcribe
pub async fn transcribe(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(req): JsonBody<TranscribeRequest>,
) -> ApiResult<Json<TranscribeResponse>> {
    let path = req.path.trim().trim_start_matches('/');
    if path.is_empty() {
        return Err(ApiError::BadRequest("path is required".to_string()));
    }
    if !is_owned_path(path, user.id) {
        return Err(ApiError::Forbidden("Media belongs to another user".to_string()));
    }

    let audio = state.storage.get(path).await?;
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let size = audio.len();

    let transcriber = &state.ai.transcriber;
    let text = transcriber.transcribe(audio, file_name, audio_content_type(path)).await?;

    info!(user_id = %user.id, path = %path, size, provider = transcriber.provider(), "Audio transcribed");

    Ok(Json(TranscribeResponse {
        text,
        provider: transcriber.provider(),
    }))
}

pub fn transcribe_routes() -> Router<AppState> {
    Router::new().route("/api/transcribe", post(transcribe))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(audio_content_type("u/a.MP3"), "audio/mpeg");
        assert_eq!(audio_content_type("u/a.weba"), "audio/webm");
        assert_eq!(audio_content_type("u/noext"), "application/octet-stream");
    }
}
