use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::future::ready;
use futures::stream::select;
use futures::SinkExt;
use futures::StreamExt;
use serde_json::json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::{info, warn};

use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Streams the current ride snapshot on every change, interleaved with
/// screen, alert and notice events from the UI bus.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let snapshots = WatchStream::new(state.coordinator.subscribe())
        .map(|snapshot| serde_json::to_string(&json!({ "type": "snapshot", "payload": snapshot })));
    let events = BroadcastStream::new(state.ui.subscribe()).filter_map(|event| {
        ready(match event {
            Ok(event) => Some(serde_json::to_string(&event)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "ws client lagging; ui events dropped");
                None
            }
        })
    });
    let mut outgoing = select(snapshots, events);

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(encoded) = outgoing.next().await {
            let json = match encoded {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize ui event for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
