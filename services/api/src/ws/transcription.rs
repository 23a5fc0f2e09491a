//! Relays live microphone audio to AssemblyAI's streaming API and sends
//! transcripts back to the browser as they arrive.

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
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::Message as WsMessage,
    },
};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const STREAMING_URL: &str = "wss://streaming.assemblyai.com/v3/ws";

/// PCM16 mono sample rate the browser client records at.
pub const SAMPLE_RATE: u32 = 16_000;

// --- Local AssemblyAI streaming types (for encapsulation) ---
mod streaming_types {
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug, PartialEq)]
    #[serde(tag = "type")]
    pub(super) enum Event {
        Begin {
            id: String,
        },
        Turn {
            #[serde(default)]
            transcript: String,
            #[serde(default)]
            end_of_turn: bool,
        },
        Termination,
        #[serde(other)]
        Unknown,
    }

    #[derive(Serialize)]
    #[serde(tag = "type")]
    pub(super) enum Control {
        Terminate,
    }
}

use streaming_types::{Control, Event};

/// What the relay should do after an upstream event.
#[derive(Debug, PartialEq)]
enum Relay {
    Forward(ServerMessage),
    Skip,
    Finished,
}

fn relay_event(event: Event) -> Relay {
    match event {
        Event::Begin { id } => Relay::Forward(ServerMessage::Ready { session_id: id }),
        Event::Turn { transcript, .. } if transcript.trim().is_empty() => Relay::Skip,
        Event::Turn {
            transcript,
            end_of_turn,
        } => Relay::Forward(ServerMessage::Transcript {
            text: transcript,
            end_of_turn,
        }),
        Event::Termination => Relay::Finished,
        Event::Unknown => Relay::Skip,
    }
}

/// Axum handler to upgrade an HTTP connection to a transcription WebSocket.
pub async fn stream_for_transcription_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

#[instrument(name = "transcription_stream", skip_all, fields(connection_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", connection_id.to_string());
    info!("New transcription stream.");

    let (mut socket_tx, socket_rx) = socket.split();

    let Some(api_key) = state.config.assemblyai_api_key.clone() else {
        warn!("ASSEMBLYAI_API_KEY is not set; refusing transcription stream.");
        let _ = send_msg(
            &mut socket_tx,
            ServerMessage::Error {
                message: "Speech-to-text is not configured.".to_string(),
            },
        )
        .await;
        return;
    };

    if let Err(e) = run(&api_key, &mut socket_tx, socket_rx).await {
        error!(error = ?e, "Transcription stream terminated with error.");
        let _ = send_msg(
            &mut socket_tx,
            ServerMessage::Error {
                message: "The transcription stream failed.".to_string(),
            },
        )
        .await;
    }
    info!("Transcription stream closed.");
}

/// Proxies audio upstream and transcripts downstream until either side ends.
async fn run(
    api_key: &str,
    socket_tx: &mut SplitSink<WebSocket, Message>,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let url = format!("{}?sample_rate={}&encoding=pcm_s16le", STREAMING_URL, SAMPLE_RATE);
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert(AUTHORIZATION, HeaderValue::from_str(api_key)?);

    let (upstream, _) = connect_async(request)
        .await
        .context("Could not connect to AssemblyAI streaming")?;
    info!("Connected to AssemblyAI streaming WebSocket.");
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    loop {
        tokio::select! {
            // Handle audio and control frames from the browser.
            client_msg = socket_rx.next() => match client_msg {
                Some(Ok(Message::Binary(data))) => {
                    upstream_tx.send(WsMessage::Binary(data)).await?;
                }
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Stop) => break,
                    Err(e) => warn!(error = %e, "Ignoring unrecognized client message."),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "Error reading from client socket.");
                    break;
                }
            },
            // Handle events from AssemblyAI.
            upstream_msg = upstream_rx.next() => match upstream_msg {
                Some(Ok(WsMessage::Text(text))) => {
                    if forward(socket_tx, &text).await? {
                        return Ok(());
                    }
                }
                Some(Ok(WsMessage::Close(close_frame))) => {
                    info!(?close_frame, "AssemblyAI closed the stream.");
                    return Ok(());
                }
                None => {
                    info!("AssemblyAI closed the stream.");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }

    // The client is done; ask AssemblyAI to flush the last turn and end the session.
    let terminate = serde_json::to_string(&Control::Terminate)?;
    upstream_tx.send(WsMessage::Text(terminate.into())).await?;
    while let Some(upstream_msg) = upstream_rx.next().await {
        match upstream_msg? {
            WsMessage::Text(text) => {
                // The browser may have gone away already; keep draining regardless.
                match forward(socket_tx, &text).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => debug!(error = %e, "Dropped transcript after client left."),
                }
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// Forwards one upstream event. Returns `true` once the session has terminated.
async fn forward(socket_tx: &mut SplitSink<WebSocket, Message>, text: &str) -> Result<bool> {
    let event = match serde_json::from_str::<Event>(text) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, raw = %text, "Failed to parse AssemblyAI event.");
            return Ok(false);
        }
    };
    match relay_event(event) {
        Relay::Forward(msg) => {
            send_msg(socket_tx, msg).await?;
            Ok(false)
        }
        Relay::Skip => Ok(false),
        Relay::Finished => Ok(true),
    }
}
