use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::state::AppState;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::RelaySession;

/// Bridge one WebSocket to a relay session.
///
/// Text frames are JSON `ClientMessage`s; a binary frame is a whole
/// utterance. Outbound messages are serialized by a dedicated writer task
/// so the pipeline never blocks on the socket.
pub async fn handle_socket(state: AppState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(256);

    let send_task = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload)).await.is_err() {
                debug!("WebSocket closed while sending");
                break;
            }
        }
        let _ = sender.close().await;
    });

    let mut session = match RelaySession::open(
        state.sessions.clone(),
        state.orchestrator.clone(),
        state.relay.clone(),
        out_tx,
    )
    .await
    {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to open session: {}", e);
            send_task.abort();
            return;
        }
    };

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(message) => session.handle(message).await,
                Err(e) => session.handle_malformed(e).await,
            },
            Ok(Message::Binary(data)) => session.handle_binary(data).await,
            Ok(Message::Close(_)) => {
                info!("Client closed session {}", session.state().session_id());
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(e) => {
                warn!("WebSocket error on session {}: {}", session.state().session_id(), e);
                break;
            }
        }
    }

    session.close().await;
    if let Err(e) = send_task.await {
        error!("WebSocket writer task failed: {}", e);
    }
}
