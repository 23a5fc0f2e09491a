//! Typed errors for the collaborator boundaries and the conversation turn.

use serde::Serialize;
use std::fmt;

/// Failure reported by one of the hosted collaborators (STT, LLM, TTS).
///
/// Clients classify HTTP outcomes into these variants so callers never have
/// to inspect error message text.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned {status}: {detail}")]
    Upstream { status: u16, detail: String },
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl ServiceError {
    /// Classifies a non-success HTTP status and its body.
    pub fn from_status(status: reqwest::StatusCode, detail: String) -> Self {
        match status.as_u16() {
            401 | 403 => ServiceError::Auth(detail),
            429 => ServiceError::RateLimited(detail),
            code => ServiceError::Upstream {
                status: code,
                detail,
            },
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Malformed(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

/// Passes successful responses through and classifies the rest.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ServiceError::from_status(status, detail))
}

/// Failure of the session store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Why a conversation turn could not complete normally.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("no audio payload was provided")]
    InvalidInput,
    #[error("missing credentials for: {}", .0.join(", "))]
    Configuration(Vec<&'static str>),
    #[error("transcription failed: {0}")]
    Transcription(#[source] ServiceError),
    #[error("transcript was empty")]
    EmptyAudio,
    #[error("generation failed: {0}")]
    Generation(#[source] ServiceError),
    #[error("language model returned no text")]
    EmptyGeneration,
    #[error("synthesis failed: {0}")]
    Synthesis(#[source] ServiceError),
}

impl TurnError {
    /// The fallback category the caller should see for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TurnError::InvalidInput => ErrorKind::InvalidInput,
            TurnError::Configuration(_) => ErrorKind::Configuration,
            TurnError::EmptyAudio => ErrorKind::EmptyAudio,
            TurnError::EmptyGeneration => ErrorKind::Generation,
            TurnError::Transcription(err) => err.kind_or(ErrorKind::Transcription),
            TurnError::Generation(err) => err.kind_or(ErrorKind::Generation),
            TurnError::Synthesis(err) => err.kind_or(ErrorKind::Synthesis),
        }
    }
}

impl ServiceError {
    fn kind_or(&self, phase: ErrorKind) -> ErrorKind {
        match self {
            ServiceError::Auth(_) => ErrorKind::Configuration,
            ServiceError::RateLimited(_) => ErrorKind::RateLimited,
            _ => phase,
        }
    }
}

/// Error category exposed to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Configuration,
    Transcription,
    EmptyAudio,
    Generation,
    Synthesis,
    RateLimited,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Transcription => "transcription",
            ErrorKind::EmptyAudio => "empty_audio",
            ErrorKind::Generation => "generation",
            ErrorKind::Synthesis => "synthesis",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}
