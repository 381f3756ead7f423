//! Outbound mail: composition of assignment mails and their delivery.
//!
//! [`MailComposer`] is a pure transformation from a [`TaskAssignment`] into a
//! [`MailEnvelope`]. A [`MailTransport`] delivers one envelope per call with a
//! single attempt; [`SmtpMailTransport`] is the relay-backed implementation.
//!
//! [`TaskAssignment`]: crate::notification::events::TaskAssignment

mod composer;
mod transport;

pub use composer::MailComposer;
pub use transport::{MailTransport, SmtpMailTransport};

use lettre::Address;
use thiserror::Error;

/// A fully composed, ready-to-send message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailEnvelope {
    pub from: Address,
    pub to: Address,
    pub subject: String,
    pub body: String,
}

/// Which address of an envelope failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    Sender,
    Recipient,
}

impl std::fmt::Display for AddressRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Recipient => write!(f, "recipient"),
        }
    }
}

/// Composition failure. Indicates bad deployment configuration or a
/// programming defect, never a transient condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    #[error("invalid {role} address '{value}': {reason}")]
    InvalidAddress {
        role: AddressRole,
        value: String,
        reason: String,
    },
}

/// Any failure while handing an envelope to the relay.
///
/// Connection refusal, STARTTLS negotiation, authentication rejection,
/// timeouts and relay rejection of the message all surface as [`Smtp`].
///
/// [`Smtp`]: TransportError::Smtp
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("relay setup failed: {0}")]
    Setup(#[source] lettre::transport::smtp::Error),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("send task aborted: {0}")]
    Aborted(String),
}
