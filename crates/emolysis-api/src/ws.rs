//! Upload + progress WebSocket.
//!
//! The client opens the socket (optionally with `?lang=en|zh`), sends the
//! video as one binary frame and then acknowledges every message except
//! `done` and `error` with a text frame. Socket reads and writes run on their
//! own tasks so the session task only ever waits on the progress protocol
//! and inference.

use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use emolysis_models::{Language, ProgressMessage, SessionLayout, UnsupportedLanguageError};
use emolysis_worker::ChannelTransport;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Configuration for WebSocket backpressure.
const WS_SEND_BUFFER_SIZE: usize = 32;

/// At most one acknowledgment waits for the session; extra ones are dropped.
const ACK_BUFFER_SIZE: usize = 1;

/// Counts one open session socket until dropped.
///
/// Created before the upgrade so a handshake that never completes still
/// releases its count.
struct ConnectionGuard;

impl ConnectionGuard {
    fn acquire() -> Self {
        let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_ws_active_connections(count);
        metrics::record_ws_connection();
        Self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    }
}

/// Query string of the session socket.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub lang: Option<String>,
}

/// Language for a session: the query value when present, else the default.
pub fn resolve_language(
    requested: Option<&str>,
    default: Language,
) -> Result<Language, UnsupportedLanguageError> {
    match requested {
        Some(lang) => lang.parse(),
        None => Ok(default),
    }
}

/// WebSocket session endpoint.
pub async fn ws_session(
    ws: WebSocketUpgrade,
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let guard = ConnectionGuard::acquire();

    let max_size = state.config.max_upload_size;
    ws.max_message_size(max_size)
        .max_frame_size(max_size)
        .on_upgrade(move |socket| async move {
            let _guard = guard;
            handle_session_socket(socket, state, query).await;
        })
}

/// Hand an acknowledgment to the session; `false` once it stopped listening.
fn offer_ack(ack_tx: &mpsc::Sender<String>, text: String) -> bool {
    match ack_tx.try_send(text) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!("Dropping surplus acknowledgment");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

async fn send_json(tx: &mpsc::Sender<Message>, message: &ProgressMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => {
            metrics::record_ws_message_sent(message.kind());
            tx.send(Message::Text(json)).await.is_ok()
        }
        Err(e) => {
            warn!("Failed to serialize progress message: {}", e);
            false
        }
    }
}

/// Wait for the upload frame, skipping anything that is not binary.
async fn receive_video(receiver: &mut SplitStream<WebSocket>) -> Option<Vec<u8>> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Binary(data)) => return Some(data),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn store_video(state: &AppState, video: &[u8]) -> ApiResult<SessionLayout> {
    let layout = state.sessions.create().await?;
    tokio::fs::write(layout.video(), video).await?;
    Ok(layout)
}

async fn handle_session_socket(socket: WebSocket, state: AppState, query: SessionQuery) {
    let (ws_sender, receiver) = socket.split();

    // Create a bounded channel for backpressure
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    // Spawn a task to handle sending messages with backpressure
    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    if let Err(message) = run_connection(&state, query, receiver, &tx).await {
        let _ = send_json(&tx, &ProgressMessage::error(message)).await;
    }

    drop(tx);
    let _ = send_task.await;
}

/// Drive one connection; `Err` carries a message for the client.
async fn run_connection(
    state: &AppState,
    query: SessionQuery,
    mut receiver: SplitStream<WebSocket>,
    tx: &mpsc::Sender<Message>,
) -> Result<(), String> {
    let language = resolve_language(query.lang.as_deref(), state.config.default_language)
        .map_err(|e| e.to_string())?;

    let upload = tokio::time::timeout(state.config.upload_timeout, receive_video(&mut receiver));
    let video = match upload.await {
        Ok(Some(video)) if !video.is_empty() => video,
        Ok(Some(_)) => return Err("Uploaded video is empty".to_string()),
        Ok(None) => {
            debug!("Client left before uploading");
            return Ok(());
        }
        Err(_) => return Err("Timed out waiting for the video upload".to_string()),
    };
    metrics::record_upload_bytes(video.len());

    let layout = store_video(state, &video).await.map_err(|e| {
        warn!("Failed to store upload: {}", e);
        "Failed to store the uploaded video".to_string()
    })?;
    drop(video);
    info!(session_id = %layout.id, language = %language, "Video uploaded");

    // Bridge the socket to the progress protocol.
    let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressMessage>(WS_SEND_BUFFER_SIZE);
    let (ack_tx, ack_rx) = mpsc::channel::<String>(ACK_BUFFER_SIZE);

    let forward_tx = tx.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(message) = progress_rx.recv().await {
            if !send_json(&forward_tx, &message).await {
                break;
            }
        }
    });

    // Any text frame acknowledges; closing the socket drops `ack_tx`, which
    // the protocol sees as a disconnect. Acks that arrive while one is
    // already pending are dropped here, and the protocol discards whatever
    // is still queued before each message it sends.
    let ack_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics::record_ws_ack_received();
                    if !offer_ack(&ack_tx, text) {
                        break;
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    let result = state
        .processor
        .run_session(&layout, language, ChannelTransport::new(progress_tx, ack_rx))
        .await;

    ack_task.abort();
    let _ = forward_task.await;

    match result {
        Ok(paths) => info!(session_id = %paths.id, "Session delivered"),
        Err(e) => warn!(session_id = %layout.id, "Session ended: {}", e),
    }
    // The protocol already told the client about failures.
    Ok(())
}
