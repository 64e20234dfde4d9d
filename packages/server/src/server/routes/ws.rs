//! WebSocket upgrade endpoint.
//!
//! Each accepted socket becomes a hub connection: a write pump drains
//! the connection's outbox into the socket, while this task reads
//! subscription control frames until the client goes away. Read-loop
//! termination is the only disconnect detection; it unconditionally
//! removes the connection from the hub.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::kernel::hub::{ControlFrame, NotificationHub, OUTBOX_CAPACITY};
use crate::server::app::AppState;

pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<NotificationHub>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOX_CAPACITY);
    let conn = hub.register(tx);
    let cancel = conn.cancel_token();

    // Write pump: hub outbox -> socket.
    let pump_cancel = cancel.clone();
    let write_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = pump_cancel.cancelled() => break,
                maybe = rx.recv() => match maybe {
                    Some(msg) => {
                        if sink.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        let _ = sink.close().await;
    });

    // Read loop: subscription control frames until disconnect.
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    // Any other frame shape is ignored.
                    if let Ok(control) = serde_json::from_str::<ControlFrame>(&text) {
                        conn.apply(control);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %conn.id(), error = %e, "websocket read error");
                    break;
                }
            },
        }
    }

    hub.remove(conn.id());
    let _ = write_task.await;
}
