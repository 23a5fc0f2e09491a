//! Text-to-Speech
//!
//! Defines the `SpeechSynthesizer` collaborator and its Murf implementation.

use crate::error::{ServiceError, check_status};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

pub const MURF_BASE_URL: &str = "https://api.murf.ai";
pub const DEFAULT_VOICE_ID: &str = "en-US-terrell";

/// Converts text into a hosted audio file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns a URL where the synthesized audio can be fetched.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    audio_file: Option<String>,
}

/// An implementation of `SpeechSynthesizer` backed by Murf's REST API.
pub struct MurfClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl MurfClient {
    pub fn new(api_key: String) -> Result<Self, ServiceError> {
        Self::with_base_url(api_key, MURF_BASE_URL.to_string())
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
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for MurfClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(format!("{}/v1/speech/generate", self.base_url))
            .header("api-key", &self.api_key)
            .json(&GenerateRequest { text, voice_id })
            .send()
            .await?;
        let body: GenerateResponse = check_status(response).await?.json().await?;

        match body.audio_file {
            Some(url) if !url.is_empty() => {
                info!(voice_id, chars = text.chars().count(), "Speech generated");
                Ok(url)
            }
            _ => Err(ServiceError::Malformed(
                "audio URL not found in Murf response".to_string(),
            )),
        }
    }
}
