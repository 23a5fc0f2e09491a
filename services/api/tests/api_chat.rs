//! Integration tests for the REST endpoints.
//!
//! Tests:
//! - `POST /agent/chat/{session_id}` — full turns, history growth, fallbacks
//! - `GET /agent/chat/{session_id}/history`
//! - `POST /generate-audio/`, `/llm/query`, `/tts/echo`, `/transcribe/file`
//! - `GET /health` — degraded without credentials

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::{path::PathBuf, sync::Arc};
use tower::ServiceExt;
use voice_agent_api::{
    config::{Config, Provider},
    router::create_router,
    state::AppState,
};
use voice_agent_core::{
    Collaborators, ServiceError, Turn,
    llm_client::LanguageModel,
    synthesizer::SpeechSynthesizer,
    transcriber::SpeechToText,
};

const BOUNDARY: &str = "voice-agent-test-boundary";

struct FixedTranscriber(&'static str);

#[async_trait]
impl SpeechToText for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, ServiceError> {
        Ok(self.0.to_string())
    }
}

/// Answers with the message and the amount of context it was given.
struct EchoModel;

#[async_trait]
impl LanguageModel for EchoModel {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        Ok(format!("You said: {}", prompt))
    }

    async fn chat(&self, context: &[Turn], message: &str) -> Result<String, ServiceError> {
        Ok(format!("({} prior) You said: {}", context.len(), message))
    }
}

struct RateLimitedModel;

#[async_trait]
impl LanguageModel for RateLimitedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
        Err(ServiceError::RateLimited("quota exceeded".into()))
    }

    async fn chat(&self, _context: &[Turn], _message: &str) -> Result<String, ServiceError> {
        Err(ServiceError::RateLimited("quota exceeded".into()))
    }
}

struct FakeSynthesizer;

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, ServiceError> {
        Ok(format!("https://audio.test/{}/{}.mp3", voice_id, text.len()))
    }
}

struct BrokenSynthesizer;

#[async_trait]
impl SpeechSynthesizer for BrokenSynthesizer {
    async fn synthesize(&self, _text: &str, _voice_id: &str) -> Result<String, ServiceError> {
        Err(ServiceError::Upstream {
            status: 500,
            detail: "synthesis backend down".into(),
        })
    }
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        provider: Provider::Gemini,
        assemblyai_api_key: None,
        gemini_api_key: None,
        openai_api_key: None,
        murf_api_key: None,
        chat_model: "gemini-1.5-flash".to_string(),
        voice_id: "en-US-terrell".to_string(),
        log_level: tracing::Level::INFO,
        prompts_path: PathBuf::from("./prompts"),
        static_dir: PathBuf::from("./static"),
        recordings_dir: PathBuf::from("./recordings"),
    }
}

fn full_collaborators(transcript: &'static str) -> Collaborators {
    Collaborators {
        transcriber: Some(Arc::new(FixedTranscriber(transcript))),
        language_model: Some(Arc::new(EchoModel)),
        synthesizer: Some(Arc::new(FakeSynthesizer)),
    }
}

fn setup_app(collaborators: Collaborators) -> axum::Router {
    create_router(Arc::new(AppState::new(test_config(), collaborators)))
}

fn multipart_request(uri: &str, field: &str, payload: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"clip.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("GET")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(
        &axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap(),
    )
    .unwrap()
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
async fn test_chat_turn_returns_audio_and_records_history() {
    let app = setup_app(full_collaborators("Hello"));

    let response = app
        .clone()
        .oneshot(multipart_request("/agent/chat/abc", "audio", b"fake-webm"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["error"], false);
    assert_eq!(body["transcript"], "Hello");
    assert_eq!(body["text"], "You said: Hello");
    assert!(body["audio_url"].as_str().unwrap().starts_with("https://audio.test/"));

    let response = app.oneshot(get_request("/agent/chat/abc/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["session_id"], "abc");
    assert_eq!(
        body["turns"],
        json!([
            {"role": "user", "text": "Hello"},
            {"role": "model", "text": "You said: Hello"}
        ])
    );
}

#[tokio::test]
async fn test_second_turn_sends_prior_context() {
    let app = setup_app(full_collaborators("Thanks"));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(multipart_request("/agent/chat/abc", "audio", b"clip"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = body_json(app.oneshot(get_request("/agent/chat/abc/history")).await.unwrap()).await;
    let turns = body["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[3]["text"], "(2 prior) You said: Thanks");
}

#[tokio::test]
async fn test_chat_without_audio_field_is_bad_request() {
    let app = setup_app(full_collaborators("Hello"));

    let response = app
        .oneshot(multipart_request("/agent/chat/abc", "file", b"clip"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("audio"));
}

#[tokio::test]
async fn test_chat_without_credentials_replies_with_configuration_fallback() {
    let app = setup_app(Collaborators::default());

    let response = app
        .oneshot(multipart_request("/agent/chat/abc", "audio", b"clip"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["error"], true);
    assert_eq!(body["error_kind"], "configuration");
    assert!(body["audio_url"].is_null());
    assert!(body["message"].as_str().unwrap().contains("configuration issue"));
}

#[tokio::test]
async fn test_blank_transcript_asks_user_to_repeat() {
    let app = setup_app(full_collaborators("   "));

    let response = app
        .clone()
        .oneshot(multipart_request("/agent/chat/quiet", "audio", b"clip"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["error_kind"], "empty_audio");
    assert!(body["message"].as_str().unwrap().contains("didn't catch that"));
    assert!(body["audio_url"].is_string());

    let history = body_json(app.oneshot(get_request("/agent/chat/quiet/history")).await.unwrap()).await;
    assert_eq!(history["turns"], json!([]));
}

#[tokio::test]
async fn test_rate_limited_model_gets_rate_limit_fallback() {
    let app = setup_app(Collaborators {
        transcriber: Some(Arc::new(FixedTranscriber("Hello"))),
        language_model: Some(Arc::new(RateLimitedModel)),
        synthesizer: Some(Arc::new(FakeSynthesizer)),
    });

    let body = body_json(
        app.oneshot(multipart_request("/agent/chat/busy", "audio", b"clip"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["error"], true);
    assert_eq!(body["error_kind"], "rate_limited");
}

#[tokio::test]
async fn test_synthesis_failure_returns_text_only() {
    let app = setup_app(Collaborators {
        transcriber: Some(Arc::new(FixedTranscriber("Hello"))),
        language_model: Some(Arc::new(EchoModel)),
        synthesizer: Some(Arc::new(BrokenSynthesizer)),
    });

    let body = body_json(
        app.oneshot(multipart_request("/agent/chat/mute", "audio", b"clip"))
            .await
            .unwrap(),
    )
    .await;
    assert!(body["audio_url"].is_null());
    assert_eq!(body["error_kind"], "synthesis");
    assert!(body["message"].as_str().unwrap().contains("You said: Hello"));
}

#[tokio::test]
async fn test_history_of_unknown_session_is_empty() {
    let app = setup_app(Collaborators::default());

    let response = app.oneshot(get_request("/agent/chat/nobody/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["session_id"], "nobody");
    assert_eq!(body["turns"], json!([]));
}

// ============================================================================
// Single-purpose endpoints
// ============================================================================

#[tokio::test]
async fn test_generate_audio_uses_requested_voice() {
    let app = setup_app(full_collaborators("unused"));

    let response = app
        .oneshot(json_request(
            "/generate-audio/",
            json!({"text": "Hi", "voice_id": "en-US-natalie"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["audio_url"], "https://audio.test/en-US-natalie/2.mp3");
}

#[tokio::test]
async fn test_generate_audio_rejects_empty_text() {
    let app = setup_app(full_collaborators("unused"));

    let response = app
        .oneshot(json_request("/generate-audio/", json!({"text": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_audio_without_tts_is_unavailable() {
    let app = setup_app(Collaborators::default());

    let response = app
        .oneshot(json_request("/generate-audio/", json!({"text": "Hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_generate_audio_upstream_failure_is_bad_gateway() {
    let app = setup_app(Collaborators {
        synthesizer: Some(Arc::new(BrokenSynthesizer)),
        ..Collaborators::default()
    });

    let response = app
        .oneshot(json_request("/generate-audio/", json!({"text": "Hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("text-to-speech"));
}

#[tokio::test]
async fn test_llm_query_answers_statelessly() {
    let app = setup_app(full_collaborators("unused"));

    let response = app
        .oneshot(json_request("/llm/query", json!({"text": "Ping"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["response"], "You said: Ping");
}

#[tokio::test]
async fn test_llm_query_rate_limit_maps_to_429() {
    let app = setup_app(Collaborators {
        language_model: Some(Arc::new(RateLimitedModel)),
        ..Collaborators::default()
    });

    let response = app
        .oneshot(json_request("/llm/query", json!({"text": "Ping"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_tts_echo_speaks_transcript() {
    let app = setup_app(full_collaborators("Echo me"));

    let response = app
        .oneshot(multipart_request("/tts/echo", "audio", b"clip"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["transcription"], "Echo me");
    assert_eq!(body["audio_url"], "https://audio.test/en-US-terrell/7.mp3");
}

#[tokio::test]
async fn test_tts_echo_rejects_silence() {
    let app = setup_app(full_collaborators(""));

    let response = app
        .oneshot(multipart_request("/tts/echo", "audio", b"clip"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transcribe_file_returns_transcript() {
    let app = setup_app(full_collaborators("Just the words"));

    let response = app
        .oneshot(multipart_request("/transcribe/file", "audio", b"clip"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["transcription"], "Just the words");
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_without_credentials_is_degraded() {
    let app = setup_app(Collaborators::default());

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(
        body["apis"],
        json!({"assemblyai": false, "gemini": false, "murf": false})
    );
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_with_all_services_is_healthy() {
    let app = setup_app(full_collaborators("unused"));

    let body = body_json(app.oneshot(get_request("/health")).await.unwrap()).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_openapi_document_lists_chat_route() {
    let app = setup_app(Collaborators::default());

    let response = app.oneshot(get_request("/api-docs/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["paths"]["/agent/chat/{session_id}"].is_object());
}
