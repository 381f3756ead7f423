//! HTTP/WebSocket surface.
//!
//! Validates inbound task assignments, hands them to the notification
//! dispatcher, and hosts the live subscriber WebSocket.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
