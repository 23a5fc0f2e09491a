use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for the language model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAI,
}

impl Provider {
    fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::OpenAI => "gpt-4o-mini",
        }
    }

    /// The environment variable holding this provider's credential.
    pub fn key_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
///
/// Service credentials are optional: a missing key degrades the endpoints
/// that need it instead of preventing startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub provider: Provider,
    pub assemblyai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub murf_api_key: Option<String>,
    pub chat_model: String,
    pub voice_id: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
    pub static_dir: PathBuf,
    pub recordings_dir: PathBuf,
}

/// Reads an optional credential, treating an empty value as absent.
fn optional_key(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let provider_str = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            "openai" => Provider::OpenAI,
            other => {
                return Err(ConfigError::InvalidValue(
                    "LLM_PROVIDER".to_string(),
                    format!("'{}' is not one of 'gemini', 'openai'", other),
                ));
            }
        };

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| provider.default_model().to_string());
        let voice_id = std::env::var("MURF_VOICE_ID")
            .unwrap_or_else(|_| voice_agent_core::synthesizer::DEFAULT_VOICE_ID.to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let path_var = |name: &str, default: &str| {
            std::env::var(name)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(default))
        };

        Ok(Self {
            bind_address,
            provider,
            assemblyai_api_key: optional_key("ASSEMBLYAI_API_KEY"),
            gemini_api_key: optional_key("GEMINI_API_KEY"),
            openai_api_key: optional_key("OPENAI_API_KEY"),
            murf_api_key: optional_key("MURF_API_KEY"),
            chat_model,
            voice_id,
            log_level,
            prompts_path: path_var("PROMPTS_PATH", "./prompts"),
            static_dir: path_var("STATIC_DIR", "./static"),
            recordings_dir: path_var("RECORDINGS_DIR", "./recordings"),
        })
    }

    /// The credential for the configured language-model provider.
    pub fn llm_api_key(&self) -> Option<&str> {
        match self.provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::OpenAI => self.openai_api_key.as_deref(),
        }
    }

    /// Environment variables whose absence degrades the service.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.assemblyai_api_key.is_none() {
            missing.push("ASSEMBLYAI_API_KEY");
        }
        if self.llm_api_key().is_none() {
            missing.push(self.provider.key_var());
        }
        if self.murf_api_key.is_none() {
            missing.push("MURF_API_KEY");
        }
        missing
    }
}
