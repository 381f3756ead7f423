//! Socket.IO live channel.
//!
//! Serves the Engine.IO/Socket.IO protocol under `/socket.io/`. Every socket
//! on the default namespace is registered under its Socket.IO `sid` and
//! receives `task_notification` events with the `{name, email, task}` payload.

use std::sync::Arc;

use socketioxide::extract::SocketRef;
use socketioxide::layer::SocketIoLayer;
use socketioxide::SocketIo;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::server::AppState;
use crate::notification::{ConnectionRegistry, SocketFrame, Subscriber, SubscriberId};

/// Build the Socket.IO layer bound to the application's registry.
pub fn layer(state: &AppState) -> SocketIoLayer {
    let (layer, io) = SocketIo::new_layer();

    let registry = Arc::clone(&state.registry);
    let capacity = state.realtime.queue_capacity;
    io.ns("/", move |socket: SocketRef| {
        on_connect(socket, Arc::clone(&registry), capacity)
    });

    layer
}

fn on_connect(socket: SocketRef, registry: Arc<ConnectionRegistry>, capacity: usize) {
    let id = SubscriberId::from(socket.id.to_string().as_str());
    let (subscriber, frames) = Subscriber::channel(id.clone(), capacity);
    registry.add(subscriber);
    info!(sid = %id, "Client connected");

    socket.on_disconnect(move |_: SocketRef| {
        registry.remove(&id);
        info!(sid = %id, "Client disconnected");
    });

    tokio::spawn(forward(socket, frames));
}

/// Re-emit queued frames as Socket.IO events until the subscriber is removed.
async fn forward(socket: SocketRef, mut frames: mpsc::Receiver<Arc<str>>) {
    while let Some(frame) = frames.recv().await {
        let frame: SocketFrame<serde_json::Value> = match serde_json::from_str(&frame) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(sid = %socket.id, error = %e, "Skipping undecodable frame");
                continue;
            }
        };

        if let Err(e) = socket.emit(frame.event, &frame.data) {
            debug!(sid = %socket.id, error = %e, "Failed to emit notification, stopping forwarder");
            break;
        }
    }
}
