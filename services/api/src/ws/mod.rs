//! WebSocket Audio Streaming
//!
//! Two byte-relay endpoints sit alongside the REST API:
//!
//! - `recording`: appends streamed audio frames to a file on disk.
//! - `transcription`: forwards PCM16 audio to the AssemblyAI streaming API
//!   and relays transcripts back to the browser.
//!
//! Both speak the JSON message format defined in `protocol`.

pub mod protocol;
pub mod recording;
pub mod transcription;

pub use recording::stream_audio_handler;
pub use transcription::stream_for_transcription_handler;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, stream::SplitSink};
use protocol::ServerMessage;

/// Serializes a `ServerMessage` and sends it as a text frame.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
