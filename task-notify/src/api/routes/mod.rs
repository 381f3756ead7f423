//! API route modules.
//!
//! Organizes routes by resource type.

pub mod health;
pub mod socket;
pub mod socketio;
pub mod tasks;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(tasks::router())
        .nest("/ws", socket::router())
        .nest("/health", health::router())
        .layer(socketio::layer(&state))
        .with_state(state)
}
