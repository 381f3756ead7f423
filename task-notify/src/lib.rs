//! task-notify library crate.
//!
//! Dual-channel delivery of task assignments: a realtime broadcast to live
//! WebSocket and Socket.IO subscribers and a best-effort email to the assignee.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;

pub use error::{Error, Result};
