//! Conversation Orchestrator
//!
//! Drives one conversational turn: transcribe the user's audio, record it in
//! the session history, generate a reply with the language model, record the
//! reply, and vocalize it. Every failure is folded into a fixed fallback reply
//! so callers always receive an `AgentReply`.

use crate::{
    conversation::{SessionStore, Turn},
    error::{ErrorKind, TurnError},
    fallback::{fallback_for, fit_for_speech},
    llm_client::LanguageModel,
    synthesizer::SpeechSynthesizer,
    transcriber::SpeechToText,
};
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// The hosted services a turn depends on. A `None` entry means the service's
/// credential was not configured.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub transcriber: Option<Arc<dyn SpeechToText>>,
    pub language_model: Option<Arc<dyn LanguageModel>>,
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Collaborators {
    /// Names of the collaborators that are not configured.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.transcriber.is_none() {
            missing.push("speech-to-text");
        }
        if self.language_model.is_none() {
            missing.push("language model");
        }
        if self.synthesizer.is_none() {
            missing.push("text-to-speech");
        }
        missing
    }
}

/// The outcome of a turn as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentReply {
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

pub struct ConversationOrchestrator {
    collaborators: Collaborators,
    store: Arc<dyn SessionStore>,
    voice_id: String,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn SessionStore>,
        voice_id: impl Into<String>,
    ) -> Self {
        Self {
            collaborators,
            store,
            voice_id: voice_id.into(),
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Runs a full turn for `session_id`. The audio is consumed and released
    /// before this returns, whatever the outcome.
    #[instrument(name = "chat_turn", skip(self, audio), fields(bytes = audio.len()))]
    pub async fn respond(&self, session_id: &str, audio: Bytes) -> AgentReply {
        match self.run_turn(session_id, audio).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "Turn failed, replying with fallback");
                self.fallback_reply(err.kind()).await
            }
        }
    }

    async fn run_turn(&self, session_id: &str, audio: Bytes) -> Result<AgentReply, TurnError> {
        if audio.is_empty() {
            return Err(TurnError::InvalidInput);
        }

        let (Some(transcriber), Some(language_model), Some(synthesizer)) = (
            &self.collaborators.transcriber,
            &self.collaborators.language_model,
            &self.collaborators.synthesizer,
        ) else {
            return Err(TurnError::Configuration(self.collaborators.missing()));
        };

        // --- Transcription ---
        let transcript = transcriber
            .transcribe(&audio)
            .await
            .map_err(TurnError::Transcription)?;
        drop(audio);
        let transcript = transcript.trim().to_string();
        if transcript.is_empty() {
            return Err(TurnError::EmptyAudio);
        }
        info!(chars = transcript.chars().count(), "Transcribed user audio");

        // Turns on one session run one at a time from here until the reply is
        // recorded, so successful turns always leave history alternating.
        let lock = self.turn_lock(session_id).await;
        let generated = {
            let _guard = lock.lock().await;
            self.exchange(session_id, &transcript, language_model.as_ref())
                .await
        };
        self.release_turn_lock(session_id, lock).await;
        let generated = generated?;
        info!(chars = generated.chars().count(), "Generated reply");

        // --- Synthesis ---
        let speech = fit_for_speech(&generated);
        match synthesizer.synthesize(&speech, &self.voice_id).await {
            Ok(audio_url) => Ok(AgentReply {
                audio_url: Some(audio_url),
                transcript: Some(transcript),
                text: Some(generated),
                message: None,
                error: false,
                error_kind: None,
            }),
            Err(err) => {
                let err = TurnError::Synthesis(err);
                warn!(error = %err, "Replying with text only");
                let note = fallback_for(ErrorKind::Synthesis).message;
                Ok(AgentReply {
                    audio_url: None,
                    transcript: Some(transcript),
                    message: Some(format!("{}\n\n{}", generated, note)),
                    text: Some(generated),
                    error: true,
                    error_kind: Some(ErrorKind::Synthesis),
                })
            }
        }
    }

    /// Records the user turn, generates a reply against the prior history and
    /// records that reply. A failed generation leaves the user turn recorded.
    async fn exchange(
        &self,
        session_id: &str,
        transcript: &str,
        language_model: &dyn LanguageModel,
    ) -> Result<String, TurnError> {
        let history = match self.store.append(session_id, Turn::user(transcript)).await {
            Ok(history) => history,
            Err(err) => {
                warn!(error = %err, "Could not record user turn, continuing without history");
                vec![Turn::user(transcript)]
            }
        };

        // --- Generation ---
        let context = &history[..history.len().saturating_sub(1)];
        let generated = if context.is_empty() {
            language_model.generate(transcript).await
        } else {
            language_model.chat(context, transcript).await
        };
        let generated = generated
            .map_err(TurnError::Generation)?
            .trim()
            .to_string();
        if generated.is_empty() {
            return Err(TurnError::EmptyGeneration);
        }

        if let Err(err) = self.store.append(session_id, Turn::model(&generated)).await {
            warn!(error = %err, "Could not record model turn");
        }
        Ok(generated)
    }

    /// Builds the fallback reply for `kind`, vocalizing it when the fallback
    /// calls for speech. If that synthesis fails too, the reply carries no
    /// audio and nothing further is attempted.
    pub async fn fallback_reply(&self, kind: ErrorKind) -> AgentReply {
        let fallback = fallback_for(kind);
        let audio_url = match (&self.collaborators.synthesizer, fallback.spoken) {
            (Some(synthesizer), true) => {
                match synthesizer.synthesize(fallback.message, &self.voice_id).await {
                    Ok(url) => Some(url),
                    Err(err) => {
                        warn!(error = %err, %kind, "Could not vocalize fallback, returning text only");
                        None
                    }
                }
            }
            _ => None,
        };

        AgentReply {
            audio_url,
            transcript: None,
            text: None,
            message: Some(fallback.message.to_string()),
            error: true,
            error_kind: Some(kind),
        }
    }

    async fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.turn_locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops the session's lock entry once no other turn holds or awaits it.
    async fn release_turn_lock(&self, session_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.turn_locks.lock().await;
        // One reference lives in the map and one is `lock`.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(session_id);
        }
    }

    #[cfg(test)]
    async fn turn_lock_count(&self) -> usize {
        self.turn_locks.lock().await.len()
    }
}
