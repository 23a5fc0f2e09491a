//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the configuration
//! and the conversation orchestrator shared by every handler, along with the
//! wiring that turns configured credentials into service clients.

use crate::config::{Config, Provider};
use async_openai::config::OpenAIConfig;
use std::sync::Arc;
use tracing::info;
use voice_agent_core::{
    Collaborators, ConversationOrchestrator, InMemorySessionStore, ServiceError,
    llm_client::{GeminiClient, LanguageModel, OpenAICompatibleClient},
    synthesizer::{MurfClient, SpeechSynthesizer},
    transcriber::{AssemblyAiClient, SpeechToText},
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<ConversationOrchestrator>,
}

impl AppState {
    /// Builds the state with a fresh in-memory session store.
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let orchestrator = ConversationOrchestrator::new(
            collaborators,
            Arc::new(InMemorySessionStore::new()),
            config.voice_id.clone(),
        );
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Creates a client for every service whose credential is configured.
/// Services without a credential are left as `None`.
pub fn build_collaborators(
    config: &Config,
    persona: Option<String>,
) -> Result<Collaborators, ServiceError> {
    let transcriber: Option<Arc<dyn SpeechToText>> = match &config.assemblyai_api_key {
        Some(key) => Some(Arc::new(AssemblyAiClient::new(key.clone())?)),
        None => None,
    };

    let language_model: Option<Arc<dyn LanguageModel>> =
        match (&config.provider, config.llm_api_key()) {
            (Provider::Gemini, Some(key)) => {
                info!(model = %config.chat_model, "Using Gemini provider.");
                Some(Arc::new(GeminiClient::new(
                    key.to_string(),
                    config.chat_model.clone(),
                    persona,
                )?))
            }
            (Provider::OpenAI, Some(key)) => {
                info!(model = %config.chat_model, "Using OpenAI provider.");
                let openai_config = OpenAIConfig::new()
                    .with_api_key(key)
                    .with_api_base(OPENAI_API_BASE);
                Some(Arc::new(OpenAICompatibleClient::new(
                    openai_config,
                    config.chat_model.clone(),
                    persona,
                )))
            }
            (_, None) => None,
        };

    let synthesizer: Option<Arc<dyn SpeechSynthesizer>> = match &config.murf_api_key {
        Some(key) => Some(Arc::new(MurfClient::new(key.clone())?)),
        None => None,
    };

    Ok(Collaborators {
        transcriber,
        language_model,
        synthesizer,
    })
}
