//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests: the
//! conversational chat endpoint, the single-purpose STT/LLM/TTS endpoints,
//! session history, and health reporting. It uses `utoipa` doc comments to
//! generate OpenAPI documentation.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{Instrument, error, info, instrument, warn};
use voice_agent_core::{ErrorKind, ServiceError};

use crate::{
    models::{
        ApiAvailability, AudioUpload, AudioUrlResponse, ChatReply, EchoResponse, ErrorResponse,
        GenerateAudioPayload, HealthResponse, HistoryResponse, LlmQueryPayload, LlmQueryResponse,
        TranscriptionResponse, TurnView,
    },
    state::AppState,
};

/// The multipart field that carries recorded audio.
const AUDIO_FIELD: &str = "audio";

pub enum ApiError {
    BadRequest(String),
    /// A collaborator needed by the endpoint has no credential configured.
    ServiceUnavailable(&'static str),
    Upstream {
        service: &'static str,
        source: ServiceError,
    },
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::ServiceUnavailable(service) => {
                let message = format!("The {} service is not configured.", service);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
            ApiError::Upstream { service, source } => {
                warn!(service, error = %source, "Upstream request failed");
                let status = match source {
                    ServiceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
                    _ => StatusCode::BAD_GATEWAY,
                };
                let message = format!("The {} service failed: {}", service, source);
                (status, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Reads the `audio` field out of a multipart body.
async fn read_audio(mut multipart: Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some(AUDIO_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Could not read audio: {}", e)));
        }
    }
    Err(ApiError::BadRequest(format!(
        "A multipart '{}' file field is required.",
        AUDIO_FIELD
    )))
}

/// Run one conversational turn: transcribe, answer with the session history, and speak the reply.
///
/// Failures inside the turn are reported in the body (`error: true`) with a
/// fallback message, never as an error status.
#[utoipa::path(
    post,
    path = "/agent/chat/{session_id}",
    request_body(content = AudioUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "The agent's reply, or a fallback reply on failure", body = ChatReply),
        (status = 400, description = "Missing audio field", body = ErrorResponse)
    ),
    params(
        ("session_id" = String, Path, description = "Client-chosen conversation identifier")
    )
)]
#[instrument(skip(state, multipart))]
pub async fn agent_chat(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ChatReply>, ApiError> {
    let audio = read_audio(multipart).await?;

    // The turn runs on its own task so a panic inside it still yields a reply.
    let orchestrator = state.orchestrator.clone();
    let turn_session = session_id.clone();
    let turn = tokio::spawn(
        async move { orchestrator.respond(&turn_session, audio).await }.in_current_span(),
    );

    let reply = match turn.await {
        Ok(reply) => reply,
        Err(err) => {
            error!(error = %err, "Turn task failed unexpectedly");
            state.orchestrator.fallback_reply(ErrorKind::Unexpected).await
        }
    };
    info!(error = reply.error, "Turn complete");
    Ok(Json(reply.into()))
}

/// Get the conversation history for a session.
#[utoipa::path(
    get,
    path = "/agent/chat/{session_id}/history",
    responses(
        (status = 200, description = "Turns in chronological order; empty for an unknown session", body = HistoryResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("session_id" = String, Path, description = "Conversation identifier")
    )
)]
pub async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state.orchestrator.store().history(&session_id).await?;
    Ok(Json(HistoryResponse {
        session_id,
        turns: turns.into_iter().map(TurnView::from).collect(),
    }))
}

/// Synthesize speech for the given text.
#[utoipa::path(
    post,
    path = "/generate-audio/",
    request_body = GenerateAudioPayload,
    responses(
        (status = 200, description = "URL of the generated audio", body = AudioUrlResponse),
        (status = 400, description = "Empty text", body = ErrorResponse),
        (status = 502, description = "Text-to-speech service failed", body = ErrorResponse),
        (status = 503, description = "Text-to-speech not configured", body = ErrorResponse)
    )
)]
pub async fn generate_audio(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateAudioPayload>,
) -> Result<Json<AudioUrlResponse>, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Text cannot be empty.".to_string()));
    }
    let synthesizer = state
        .orchestrator
        .collaborators()
        .synthesizer
        .clone()
        .ok_or(ApiError::ServiceUnavailable("text-to-speech"))?;

    let voice_id = payload
        .voice_id
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| state.orchestrator.voice_id());

    let audio_url = synthesizer
        .synthesize(text, voice_id)
        .await
        .map_err(|source| ApiError::Upstream {
            service: "text-to-speech",
            source,
        })?;
    Ok(Json(AudioUrlResponse { audio_url }))
}

/// Transcribe an uploaded recording and speak the transcript back.
#[utoipa::path(
    post,
    path = "/tts/echo",
    request_body(content = AudioUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Echoed audio and the transcript", body = EchoResponse),
        (status = 400, description = "Missing audio or no speech detected", body = ErrorResponse),
        (status = 502, description = "Upstream service failed", body = ErrorResponse),
        (status = 503, description = "Speech services not configured", body = ErrorResponse)
    )
)]
pub async fn tts_echo(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<EchoResponse>, ApiError> {
    let audio = read_audio(multipart).await?;
    let collaborators = state.orchestrator.collaborators();
    let transcriber = collaborators
        .transcriber
        .clone()
        .ok_or(ApiError::ServiceUnavailable("speech-to-text"))?;
    let synthesizer = collaborators
        .synthesizer
        .clone()
        .ok_or(ApiError::ServiceUnavailable("text-to-speech"))?;

    let transcription = transcriber
        .transcribe(&audio)
        .await
        .map_err(|source| ApiError::Upstream {
            service: "speech-to-text",
            source,
        })?;
    let transcription = transcription.trim().to_string();
    if transcription.is_empty() {
        return Err(ApiError::BadRequest(
            "No speech was detected in the recording.".to_string(),
        ));
    }

    let audio_url = synthesizer
        .synthesize(&transcription, state.orchestrator.voice_id())
        .await
        .map_err(|source| ApiError::Upstream {
            service: "text-to-speech",
            source,
        })?;
    Ok(Json(EchoResponse {
        audio_url,
        transcription,
    }))
}

/// Ask the language model a single, stateless question.
#[utoipa::path(
    post,
    path = "/llm/query",
    request_body = LlmQueryPayload,
    responses(
        (status = 200, description = "The model's answer", body = LlmQueryResponse),
        (status = 400, description = "Empty text", body = ErrorResponse),
        (status = 502, description = "Language model failed", body = ErrorResponse),
        (status = 503, description = "Language model not configured", body = ErrorResponse)
    )
)]
pub async fn llm_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LlmQueryPayload>,
) -> Result<Json<LlmQueryResponse>, ApiError> {
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Text cannot be empty.".to_string()));
    }
    let model = state
        .orchestrator
        .collaborators()
        .language_model
        .clone()
        .ok_or(ApiError::ServiceUnavailable("language model"))?;

    let response = model
        .generate(text)
        .await
        .map_err(|source| ApiError::Upstream {
            service: "language model",
            source,
        })?;
    Ok(Json(LlmQueryResponse { response }))
}

/// Transcribe an uploaded recording.
#[utoipa::path(
    post,
    path = "/transcribe/file",
    request_body(content = AudioUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "The transcript (may be empty)", body = TranscriptionResponse),
        (status = 400, description = "Missing audio field", body = ErrorResponse),
        (status = 502, description = "Speech-to-text service failed", body = ErrorResponse),
        (status = 503, description = "Speech-to-text not configured", body = ErrorResponse)
    )
)]
pub async fn transcribe_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let audio = read_audio(multipart).await?;
    let transcriber = state
        .orchestrator
        .collaborators()
        .transcriber
        .clone()
        .ok_or(ApiError::ServiceUnavailable("speech-to-text"))?;

    let transcription = transcriber
        .transcribe(&audio)
        .await
        .map_err(|source| ApiError::Upstream {
            service: "speech-to-text",
            source,
        })?;
    Ok(Json(TranscriptionResponse { transcription }))
}

/// Report which upstream services are configured.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let collaborators = state.orchestrator.collaborators();
    Json(HealthResponse::new(ApiAvailability {
        assemblyai: collaborators.transcriber.is_some(),
        gemini: collaborators.language_model.is_some(),
        murf: collaborators.synthesizer.is_some(),
    }))
}
