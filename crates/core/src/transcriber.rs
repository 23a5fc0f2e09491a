//! Speech-to-Text
//!
//! Defines the `SpeechToText` collaborator and its AssemblyAI implementation,
//! which uploads the recording, requests a transcript, and polls until the
//! transcript reaches a terminal status.

use crate::error::{ServiceError, check_status};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ASSEMBLYAI_BASE_URL: &str = "https://api.assemblyai.com";

/// Transcribes a complete audio recording to text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Returns the transcript, which is empty when no speech was recognized.
    async fn transcribe(&self, audio: &[u8]) -> Result<String, ServiceError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Serialize)]
struct TranscriptRequest<'a> {
    audio_url: &'a str,
}

#[derive(Deserialize, Debug)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

/// An implementation of `SpeechToText` backed by AssemblyAI's REST API.
pub struct AssemblyAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl AssemblyAiClient {
    pub fn new(api_key: String) -> Result<Self, ServiceError> {
        Self::with_base_url(api_key, ASSEMBLYAI_BASE_URL.to_string())
    }

    /// Creates a client against a custom endpoint (used for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url,
            poll_interval: Duration::from_secs(1),
            max_polls: 300,
        })
    }

    /// Overrides how often and how many times the transcript status is polled.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    async fn upload(&self, audio: &[u8]) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", &self.api_key)
            .header("content-type", "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await?;
        let upload: UploadResponse = check_status(response).await?.json().await?;
        Ok(upload.upload_url)
    }

    async fn request_transcript(&self, audio_url: &str) -> Result<TranscriptResponse, ServiceError> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&TranscriptRequest { audio_url })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn fetch_transcript(&self, id: &str) -> Result<TranscriptResponse, ServiceError> {
        let response = self
            .client
            .get(format!("{}/v2/transcript/{}", self.base_url, id))
            .header("authorization", &self.api_key)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl SpeechToText for AssemblyAiClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, ServiceError> {
        debug!(bytes = audio.len(), "Uploading audio to AssemblyAI");
        let audio_url = self.upload(audio).await?;
        let mut transcript = self.request_transcript(&audio_url).await?;

        let mut polls = 0;
        loop {
            match transcript.status {
                TranscriptStatus::Completed => {
                    let text = transcript.text.unwrap_or_default();
                    info!(id = %transcript.id, chars = text.len(), "Transcription completed");
                    return Ok(text);
                }
                TranscriptStatus::Error => {
                    let detail = transcript
                        .error
                        .unwrap_or_else(|| "transcription failed".to_string());
                    warn!(id = %transcript.id, %detail, "AssemblyAI reported an error");
                    return Err(ServiceError::Upstream {
                        status: 200,
                        detail,
                    });
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {}
            }

            polls += 1;
            if polls > self.max_polls {
                return Err(ServiceError::Network(format!(
                    "transcript {} not ready after {} polls",
                    transcript.id, self.max_polls
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            transcript = self.fetch_transcript(&transcript.id).await?;
        }
    }
}
