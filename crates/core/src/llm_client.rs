use crate::conversation::{Role, Turn};
use crate::error::{ServiceError, check_status};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// The persona attached to every generation request unless overridden.
pub const DEFAULT_PERSONA: &str = "You are a friendly, upbeat voice assistant. \
Answer in a warm, conversational tone using short sentences that sound natural when spoken aloud. \
Avoid markdown, lists, code blocks, and emoji. Keep answers concise unless the user asks for detail.";

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Answers a single prompt with no prior context.
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError>;

    /// Answers `message` given the earlier turns of the conversation.
    async fn chat(&self, context: &[Turn], message: &str) -> Result<String, ServiceError>;
}

// --- Gemini ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl<'a> Content<'a> {
    fn from_turn(turn: &'a Turn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: Some(role),
            parts: vec![Part { text: &turn.text }],
        }
    }

    fn user(text: &'a str) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part { text }],
        }
    }
}

/// An implementation of `LanguageModel` for Google's Gemini `generateContent` API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    persona: Option<String>,
    base_url: String,
}

impl GeminiClient {
    /// Creates a new Gemini client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - The Gemini API key.
    /// * `model` - The model identifier (e.g., "gemini-1.5-flash").
    /// * `persona` - Optional system instruction sent with every request.
    pub fn new(
        api_key: String,
        model: String,
        persona: Option<String>,
    ) -> Result<Self, ServiceError> {
        Self::with_base_url(api_key, model, persona, GEMINI_BASE_URL.to_string())
    }

    /// Creates a client against a custom endpoint (used for testing).
    pub fn with_base_url(
        api_key: String,
        model: String,
        persona: Option<String>,
        base_url: String,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            persona,
            base_url,
        })
    }

    async fn generate_content(&self, contents: Vec<Content<'_>>) -> Result<String, ServiceError> {
        let request = GenerateContentRequest {
            system_instruction: self.persona.as_deref().map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
            contents,
        };
        debug!(model = %self.model, turns = request.contents.len(), "Calling Gemini");

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: GenerateContentResponse = check_status(response).await?.json().await?;

        // An empty string signals "no text"; the caller decides what that means.
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(text)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        self.generate_content(vec![Content::user(prompt)]).await
    }

    async fn chat(&self, context: &[Turn], message: &str) -> Result<String, ServiceError> {
        let mut contents: Vec<Content> = context.iter().map(Content::from_turn).collect();
        contents.push(Content::user(message));
        self.generate_content(contents).await
    }
}

// --- OpenAI-compatible ---

/// An implementation of `LanguageModel` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    persona: Option<String>,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    /// * `persona` - Optional system message prepended to every request.
    ///
    /// The client never retries: a failed request is returned to the caller
    /// as soon as the upstream answers.
    pub fn new(config: OpenAIConfig, model: String, persona: Option<String>) -> Self {
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(no_retry),
            model,
            persona,
        }
    }

    fn build_messages(
        &self,
        context: &[Turn],
        message: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(context.len() + 2);
        if let Some(persona) = &self.persona {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(persona.clone())
                    .build()?
                    .into(),
            );
        }
        for turn in context {
            match turn.role {
                Role::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
                Role::Model => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.text.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.to_string())
                .build()?
                .into(),
        );
        Ok(messages)
    }

    async fn complete(&self, context: &[Turn], message: &str) -> Result<String, OpenAIError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.build_messages(context, message)?)
            .build()?;

        let response = self.client.chat().create(request).await?;
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

/// Maps async-openai failures onto the collaborator error taxonomy using the
/// structured error code, never the message text.
fn classify_openai_error(err: OpenAIError) -> ServiceError {
    match err {
        OpenAIError::ApiError(api) => match api.code.as_deref() {
            Some("invalid_api_key") => ServiceError::Auth(api.message),
            Some("rate_limit_exceeded") | Some("insufficient_quota") => {
                ServiceError::RateLimited(api.message)
            }
            _ => ServiceError::Upstream {
                status: 0,
                detail: api.message,
            },
        },
        OpenAIError::Reqwest(e) => ServiceError::Network(e.to_string()),
        OpenAIError::JSONDeserialize(e) => ServiceError::Malformed(e.to_string()),
        other => ServiceError::Upstream {
            status: 0,
            detail: other.to_string(),
        },
    }
}

#[async_trait]
impl LanguageModel for OpenAICompatibleClient {
    async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
        self.complete(&[], prompt)
            .await
            .map_err(classify_openai_error)
    }

    async fn chat(&self, context: &[Turn], message: &str) -> Result<String, ServiceError> {
        self.complete(context, message)
            .await
            .map_err(classify_openai_error)
    }
}
