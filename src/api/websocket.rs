//! WebSocket handler for live reading push

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::api::state::ApiState;
use crate::hub::HubEvent;

/// WebSocket upgrade handler
///
/// GET /stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    // Subscribe before answering the upgrade so the client misses nothing
    // published after its handshake completes
    let events = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, events))
}

/// Forward hub events to one client until either side goes away
async fn handle_websocket(socket: WebSocket, mut events: broadcast::Receiver<HubEvent>) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("failed to serialize hub event: {e}");
                            continue;
                        }
                    };

                    if sender.send(Message::Text(text)).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagging, skipped {skipped} events");
                }
                Err(RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // Clients do not send anything meaningful; watch for close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected");
}
