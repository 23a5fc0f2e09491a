//! Defines the WebSocket message protocol between the browser client and the API server.

use serde::{Deserialize, Serialize};

/// Control messages sent from the client (browser) to the server.
/// Audio itself travels as binary frames.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The client has finished streaming audio.
    Stop,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The upstream transcription session is open and accepting audio.
    Ready { session_id: String },
    /// A recording was written to disk.
    Saved { bytes: u64, path: String },
    /// Partial or final transcript for the current turn.
    Transcript { text: String, end_of_turn: bool },
    /// Reports a fatal error to the client. The socket closes afterwards.
    Error { message: String },
}
