//! Realtime feed for one world group.
//!
//! Pushes `line_inserted`, `notice`, `status` and `resync` events as JSON text
//! frames. A client that falls behind the broadcast buffer gets `resync` and
//! should refetch lines over HTTP.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use worldchat_core::storage::{Database, WorldGroupStore};
use worldchat_core::GroupEvent;

use crate::error::AppError;
use crate::AppState;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
}

pub async fn handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    {
        let db = Database::new(&state.db_path)?;
        if WorldGroupStore::new(&db).get(&id)?.is_none() {
            return Err(AppError::NotFound(format!("World group {} not found", id)));
        }
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, id))
        .into_response())
}

async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &GroupEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::warn!("Failed to serialize group event: {}", e);
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, group_id: String) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut events = state.hub.subscribe(&group_id);

    tracing::debug!(group = %group_id, "Realtime subscriber connected");

    let initial = GroupEvent::Status {
        status: state.schedulers.status(&group_id),
    };
    if !send_event(&mut ws_sink, &initial).await {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !send_event(&mut ws_sink, &event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(group = %group_id, skipped, "Realtime subscriber lagged");
                    if !send_event(&mut ws_sink, &GroupEvent::Resync).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = ws_stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(ClientMessage::Ping) = serde_json::from_str(&text) {
                        let pong = serde_json::json!({ "type": "pong" });
                        if ws_sink.send(Message::Text(pong.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = ws_sink.close().await;
    tracing::debug!(group = %group_id, "Realtime subscriber disconnected");
}
