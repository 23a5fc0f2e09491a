//! Fixed user-facing fallback messages, one per error kind.

use crate::error::ErrorKind;

/// Appended to speech input that had to be cut short.
pub const TRUNCATION_SUFFIX: &str = "... I have more to say, but I'll stop here.";

/// Longest text the synthesizer accepts.
pub const MAX_SPEECH_CHARS: usize = 3000;

/// Length of the prefix kept when text exceeds `MAX_SPEECH_CHARS`.
pub const TRUNCATED_PREFIX_CHARS: usize = 2950;

/// Appended to generated text when no audio could be produced for it.
pub const AUDIO_UNAVAILABLE_NOTE: &str = "(Sorry, I couldn't generate audio for this response.)";

/// The reply to give for a failed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback {
    pub message: &'static str,
    /// Whether the message should be vocalized with the default voice.
    pub spoken: bool,
}

/// Maps an error kind to its fixed fallback.
pub fn fallback_for(kind: ErrorKind) -> Fallback {
    let (message, spoken) = match kind {
        ErrorKind::InvalidInput => (
            "I didn't receive any audio. Please try recording again.",
            true,
        ),
        ErrorKind::Configuration => (
            "I'm having a configuration issue right now. Please try again later.",
            true,
        ),
        ErrorKind::Transcription => (
            "I'm having trouble understanding the audio right now. Could you please try again?",
            true,
        ),
        ErrorKind::EmptyAudio => ("I didn't catch that. Could you please repeat?", true),
        ErrorKind::Generation => (
            "I'm having trouble thinking of a response right now. Please try again in a moment.",
            true,
        ),
        ErrorKind::RateLimited => (
            "I'm receiving too many requests right now. Please wait a moment and try again.",
            true,
        ),
        ErrorKind::Synthesis => (AUDIO_UNAVAILABLE_NOTE, false),
        ErrorKind::Unexpected => (
            "I'm having trouble connecting right now. Please try again.",
            true,
        ),
    };
    Fallback { message, spoken }
}

/// Shortens `text` so the synthesizer accepts it.
///
/// Text within `MAX_SPEECH_CHARS` is returned unchanged. Longer text keeps its
/// first `TRUNCATED_PREFIX_CHARS` characters followed by `TRUNCATION_SUFFIX`.
pub fn fit_for_speech(text: &str) -> String {
    if text.chars().count() <= MAX_SPEECH_CHARS {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(TRUNCATED_PREFIX_CHARS).collect();
    shortened.push_str(TRUNCATION_SUFFIX);
    shortened
}
