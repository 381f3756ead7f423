//! Live task notification WebSocket route.
//!
//! Every connection becomes a [`Subscriber`] in the connection registry for
//! as long as the socket is open. Task notifications arrive as JSON text
//! frames: `{"event": "task_notification", "data": {"name", "email", "task"}}`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::api::server::AppState;
use crate::notification::{ConnectionRegistry, Subscriber, SubscriberId};

/// Create the socket router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(notifications_ws))
}

/// Upgrade to a WebSocket that receives task notifications.
async fn notifications_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Removes the subscriber from the registry when the connection task ends,
/// including when it is aborted.
struct Registration {
    registry: Arc<ConnectionRegistry>,
    id: SubscriberId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
        info!(subscriber_id = %self.id, "Client disconnected");
    }
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = SubscriberId::generate();
    let (subscriber, frames) = Subscriber::channel(id.clone(), state.realtime.queue_capacity);
    state.registry.add(subscriber);
    info!(subscriber_id = %id, "Client connected");

    let _registration = Registration {
        registry: Arc::clone(&state.registry),
        id,
    };

    pump(socket, frames, state.realtime.heartbeat_interval()).await;
}

/// Forward queued frames to the client and service control frames until
/// either side goes away.
async fn pump(socket: WebSocket, mut frames: mpsc::Receiver<Arc<str>>, heartbeat: Duration) {
    let (mut sender, mut receiver) = socket.split();

    let mut heartbeat_interval = tokio::time::interval(heartbeat);
    // The first tick completes immediately.
    heartbeat_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    // Inbound text/binary carries no meaning on this channel.
                    _ => {}
                }
            }

            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = sender.send(Message::Text(frame.to_string().into())).await {
                            debug!("Failed to send notification, closing connection: {}", e);
                            break;
                        }
                    }
                    // Pruned from the registry.
                    None => break,
                }
            }

            _ = heartbeat_interval.tick() => {
                if awaiting_pong {
                    debug!("Client failed to respond to Ping, closing connection");
                    break;
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_ok() {
                    awaiting_pong = true;
                } else {
                    debug!("Failed to send Ping, closing connection");
                    break;
                }
            }
        }
    }

    let _ = sender.close().await;
}
