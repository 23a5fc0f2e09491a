//! Voice Agent Core
//!
//! Conversation state and turn orchestration for the voice agent, plus the
//! clients for the hosted speech-to-text, language-model, and text-to-speech
//! services it chains together. This crate has no web framework dependency.

pub mod conversation;
pub mod error;
pub mod fallback;
pub mod llm_client;
pub mod orchestrator;
pub mod synthesizer;
pub mod transcriber;

pub use conversation::{InMemorySessionStore, Role, SessionStore, Turn};
pub use error::{ErrorKind, ServiceError, StoreError, TurnError};
pub use orchestrator::{AgentReply, Collaborators, ConversationOrchestrator};
