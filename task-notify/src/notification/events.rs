//! Notification events.
//!
//! Defines the validated task assignment handed to the dispatcher and the
//! event that is pushed to live subscribers.

use std::str::FromStr;

use lettre::Address;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Event name used on the live channel for task assignments.
pub const TASK_NOTIFICATION_EVENT: &str = "task_notification";

/// A validated task assignment.
///
/// The only way to build one is [`TaskAssignment::new`], so holding a value
/// means the assignee address has already passed syntax validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAssignment {
    assignee_name: String,
    assignee_email: String,
    task_description: String,
}

impl TaskAssignment {
    /// Validate and build an assignment.
    pub fn new(
        assignee_name: impl Into<String>,
        assignee_email: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Result<Self> {
        let assignee_email = assignee_email.into().trim().to_string();
        let address = Address::from_str(&assignee_email).map_err(|e| {
            Error::validation(format!(
                "email '{}' is not a valid address: {}",
                assignee_email, e
            ))
        })?;
        if !is_deliverable_domain(address.domain()) {
            return Err(Error::validation(format!(
                "email '{}' is not a valid address: domain must be a dotted host name",
                assignee_email
            )));
        }

        Ok(Self {
            assignee_name: assignee_name.into(),
            assignee_email,
            task_description: task_description.into(),
        })
    }

    pub fn assignee_name(&self) -> &str {
        &self.assignee_name
    }

    pub fn assignee_email(&self) -> &str {
        &self.assignee_email
    }

    pub fn task_description(&self) -> &str {
        &self.task_description
    }
}

/// Assignee domains must be public-looking host names: `localhost`, single
/// labels and address literals are refused.
fn is_deliverable_domain(domain: &str) -> bool {
    !domain.starts_with('[')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Payload broadcast to live subscribers, derived 1:1 from a [`TaskAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub name: String,
    pub email: String,
    pub task: String,
}

impl From<&TaskAssignment> for NotificationEvent {
    fn from(assignment: &TaskAssignment) -> Self {
        Self {
            name: assignment.assignee_name.clone(),
            email: assignment.assignee_email.clone(),
            task: assignment.task_description.clone(),
        }
    }
}

/// Wire frame sent to live subscribers: a named event plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketFrame<T> {
    pub event: String,
    pub data: T,
}

impl SocketFrame<NotificationEvent> {
    pub fn task_notification(event: NotificationEvent) -> Self {
        Self {
            event: TASK_NOTIFICATION_EVENT.to_string(),
            data: event,
        }
    }
}
