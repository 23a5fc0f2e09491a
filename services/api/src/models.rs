//! API Models
//!
//! Request and response bodies for the REST API. These mirror the core types
//! and carry the `utoipa` schemas used for the OpenAPI documentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use voice_agent_core::{AgentReply, Turn};

/// The reply to a conversational turn. On failure `error` is set and
/// `message` holds the fallback text; `audio_url` may then be null.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatReply {
    #[schema(example = "https://murf.ai/audio/reply.mp3")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "transcription")]
    pub error_kind: Option<String>,
}

impl From<AgentReply> for ChatReply {
    fn from(reply: AgentReply) -> Self {
        Self {
            audio_url: reply.audio_url,
            transcript: reply.transcript,
            text: reply.text,
            message: reply.message,
            error: reply.error,
            error_kind: reply.error_kind.map(|k| k.to_string()),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
pub struct TurnView {
    #[schema(example = "user")]
    pub role: String,
    pub text: String,
}

impl From<Turn> for TurnView {
    fn from(turn: Turn) -> Self {
        Self {
            role: turn.role.to_string(),
            text: turn.text,
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<TurnView>,
}

/// Multipart body carrying a recorded audio file.
#[derive(ToSchema)]
pub struct AudioUpload {
    #[schema(value_type = String, format = Binary)]
    pub audio: Vec<u8>,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateAudioPayload {
    #[schema(example = "Hello from the voice agent!")]
    pub text: String,
    /// Overrides the configured default voice.
    #[schema(example = "en-US-terrell")]
    pub voice_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AudioUrlResponse {
    pub audio_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct EchoResponse {
    pub audio_url: String,
    pub transcription: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LlmQueryPayload {
    #[schema(example = "What is the capital of France?")]
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct LlmQueryResponse {
    pub response: String,
}

#[derive(Serialize, ToSchema)]
pub struct TranscriptionResponse {
    pub transcription: String,
}

/// Which upstream credentials are configured.
#[derive(Serialize, ToSchema, Debug, PartialEq)]
pub struct ApiAvailability {
    pub assemblyai: bool,
    /// The configured language-model provider, whichever it is.
    pub gemini: bool,
    pub murf: bool,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub apis: ApiAvailability,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(apis: ApiAvailability) -> Self {
        let status = if apis.assemblyai && apis.gemini && apis.murf {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        Self {
            status,
            apis,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_agent_core::ErrorKind;

    #[test]
    fn test_chat_reply_from_success() {
        let reply = ChatReply::from(AgentReply {
            audio_url: Some("https://audio/1.mp3".into()),
            transcript: Some("Hello".into()),
            text: Some("Hi there!".into()),
            message: None,
            error: false,
            error_kind: None,
        });

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["audio_url"], "https://audio/1.mp3");
        assert_eq!(json["transcript"], "Hello");
        assert_eq!(json["error"], false);
        assert!(json.get("message").is_none());
        assert!(json.get("error_kind").is_none());
    }

    #[test]
    fn test_chat_reply_keeps_null_audio() {
        let reply = ChatReply::from(AgentReply {
            audio_url: None,
            transcript: None,
            text: None,
            message: Some("I didn't catch that.".into()),
            error: true,
            error_kind: Some(ErrorKind::EmptyAudio),
        });

        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains(r#""audio_url":null"#));
        assert!(json.contains(r#""error_kind":"empty_audio""#));
    }

    #[test]
    fn test_turn_view_role_is_lowercase() {
        let view = TurnView::from(Turn::model("Sure."));
        assert_eq!(view.role, "model");
        assert_eq!(TurnView::from(Turn::user("Hi")).role, "user");
    }

    #[test]
    fn test_health_status_reflects_availability() {
        let healthy = HealthResponse::new(ApiAvailability {
            assemblyai: true,
            gemini: true,
            murf: true,
        });
        assert_eq!(healthy.status, HealthStatus::Healthy);

        let degraded = HealthResponse::new(ApiAvailability {
            assemblyai: true,
            gemini: false,
            murf: true,
        });
        assert_eq!(degraded.status, HealthStatus::Degraded);
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["apis"]["gemini"], false);
    }

    #[test]
    fn test_generate_audio_payload_voice_is_optional() {
        let payload: GenerateAudioPayload = serde_json::from_str(r#"{"text": "Hi"}"#).unwrap();
        assert_eq!(payload.text, "Hi");
        assert!(payload.voice_id.is_none());
    }

    #[test]
    fn test_payload_missing_text_fails() {
        let result: Result<LlmQueryPayload, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Text cannot be empty.".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Text cannot be empty."}"#);
    }
}
