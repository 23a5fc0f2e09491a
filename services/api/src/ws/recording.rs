//! Streams raw audio frames from the browser into a file under the recordings directory.

use super::{
    protocol::{ClientMessage, ServerMessage},
    send_msg,
};
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;
use std::{path::Path, sync::Arc};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a recording WebSocket.
pub async fn stream_audio_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

#[instrument(name = "recording", skip_all, fields(recording_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let recording_id = Uuid::new_v4();
    tracing::Span::current().record("recording_id", recording_id.to_string());
    info!("New recording stream.");

    if let Err(e) = record(socket, &state.config.recordings_dir, recording_id).await {
        error!(error = ?e, "Recording stream failed.");
    }
}

/// Appends every binary frame to `<dir>/<id>.webm` until the client sends
/// `stop` or closes, then acknowledges with the byte count.
async fn record(socket: WebSocket, dir: &Path, recording_id: Uuid) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Could not create {}", dir.display()))?;
    let path = dir.join(format!("{}.webm", recording_id));
    let mut file = fs::File::create(&path)
        .await
        .with_context(|| format!("Could not create {}", path.display()))?;

    let (mut socket_tx, mut socket_rx) = socket.split();
    let mut written: u64 = 0;

    while let Some(msg) = socket_rx.next().await {
        match msg? {
            Message::Binary(data) => {
                file.write_all(&data).await?;
                written += data.len() as u64;
            }
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Stop) => break,
                Err(e) => warn!(error = %e, "Ignoring unrecognized client message."),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }
    file.flush().await?;

    let path = path.display().to_string();
    info!(bytes = written, %path, "Recording saved.");
    // The client may already be gone after a close frame.
    if send_msg(
        &mut socket_tx,
        ServerMessage::Saved {
            bytes: written,
            path,
        },
    )
    .await
    .is_err()
    {
        warn!("Client left before the save acknowledgement.");
    }
    Ok(())
}
