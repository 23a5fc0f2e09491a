//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoints, the static front end, and
//! OpenAPI documentation.

use crate::{
    handlers,
    models::{
        ApiAvailability, AudioUpload, AudioUrlResponse, ChatReply, EchoResponse, ErrorResponse,
        GenerateAudioPayload, HealthResponse, HealthStatus, HistoryResponse, LlmQueryPayload,
        LlmQueryResponse, TranscriptionResponse, TurnView,
    },
    state::AppState,
    ws::{stream_audio_handler, stream_for_transcription_handler},
};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Upper bound for uploaded recordings.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::agent_chat,
        handlers::chat_history,
        handlers::generate_audio,
        handlers::tts_echo,
        handlers::llm_query,
        handlers::transcribe_file,
        handlers::health,
    ),
    components(
        schemas(ChatReply, TurnView, HistoryResponse, AudioUpload, GenerateAudioPayload, AudioUrlResponse, EchoResponse, LlmQueryPayload, LlmQueryResponse, TranscriptionResponse, ApiAvailability, HealthStatus, HealthResponse, ErrorResponse)
    ),
    tags(
        (name = "Voice Agent API", description = "Conversational voice agent chaining speech-to-text, a language model, and text-to-speech")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let static_dir = app_state.config.static_dir.clone();

    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/agent/chat/{session_id}", post(handlers::agent_chat))
        .route(
            "/agent/chat/{session_id}/history",
            get(handlers::chat_history),
        )
        .route("/generate-audio/", post(handlers::generate_audio))
        .route("/tts/echo", post(handlers::tts_echo))
        .route("/llm/query", post(handlers::llm_query))
        .route("/transcribe/file", post(handlers::transcribe_file))
        .route("/health", get(handlers::health))
        .route("/ws/stream-audio", get(stream_audio_handler))
        .route(
            "/ws/stream-for-transcription",
            get(stream_for_transcription_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Merge the stateful routes with the stateless ones (Swagger UI, front end).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
}
