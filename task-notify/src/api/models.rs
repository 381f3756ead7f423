//! API request and response models (DTOs).

use serde::{Deserialize, Serialize};

use crate::notification::{DispatchOutcome, TaskAssignment};
use crate::{Error, Result};

/// Status string returned for every accepted assignment, whatever the
/// outcome of the mail channel.
pub const ASSIGNED_STATUS: &str = "Task assigned and notification sent";

// ============================================================================
// Tasks
// ============================================================================

/// Body of `POST /assign-task/`.
///
/// Fields are optional at the serde level so that a missing field produces
/// the same validation error shape as a malformed email.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignTaskRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub task: Option<String>,
}

impl AssignTaskRequest {
    /// Validate the request into a [`TaskAssignment`].
    pub fn into_assignment(self) -> Result<TaskAssignment> {
        let missing: Vec<&str> = [
            ("name", self.name.is_none()),
            ("email", self.email.is_none()),
            ("task", self.task.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        match (self.name, self.email, self.task) {
            (Some(name), Some(email), Some(task)) => TaskAssignment::new(name, email, task),
            _ => Err(Error::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Response for an accepted assignment.
#[derive(Debug, Clone, Serialize)]
pub struct AssignTaskResponse {
    pub status: String,
    /// Per-channel result of the dispatch.
    pub notification: DispatchOutcome,
}

impl AssignTaskResponse {
    pub fn new(notification: DispatchOutcome) -> Self {
        Self {
            status: ASSIGNED_STATUS.to_string(),
            notification,
        }
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Live subscribers currently connected.
    pub subscribers: usize,
}
