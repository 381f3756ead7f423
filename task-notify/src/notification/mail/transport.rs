//! SMTP delivery of composed envelopes.

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{MailEnvelope, TransportError};
use crate::config::MailConfig;

/// Delivers one envelope per call.
///
/// Implementations make exactly one attempt and must release any network
/// session they opened before returning, whether the send succeeded or not.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Transport name used in logs.
    fn name(&self) -> &'static str;

    /// Send `envelope`. Consumes it: an envelope is attempted at most once.
    async fn send(&self, envelope: MailEnvelope) -> Result<(), TransportError>;
}

/// Transport backed by an authenticated SMTP relay.
///
/// No connection pooling: every send opens a session (connect, STARTTLS,
/// AUTH), submits the message and quits. The session is dropped on every
/// exit path, which closes the socket.
pub struct SmtpMailTransport {
    relay: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpMailTransport {
    /// Build the relay client from configuration. Does not connect.
    pub fn new(config: &MailConfig) -> Result<Self, TransportError> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(TransportError::Setup)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(config.timeout()));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            relay: builder.build(),
            host: config.smtp_host.clone(),
            port: config.smtp_port,
        })
    }

    fn build_message(envelope: MailEnvelope) -> Result<Message, TransportError> {
        Ok(Message::builder()
            .from(Mailbox::new(None, envelope.from))
            .to(Mailbox::new(None, envelope.to))
            .subject(envelope.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(envelope.body)?)
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, envelope: MailEnvelope) -> Result<(), TransportError> {
        let message = Self::build_message(envelope)?;

        debug!(host = %self.host, port = self.port, "Submitting mail to relay");
        let response = self.relay.send(message).await?;
        debug!(code = %response.code(), "Relay accepted mail");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use lettre::Address;

    use super::*;

    fn envelope() -> MailEnvelope {
        MailEnvelope {
            from: Address::from_str("taskbot@example.com").unwrap(),
            to: Address::from_str("alice@example.com").unwrap(),
            subject: "New Task Assigned".to_string(),
            body: "Hello Alice".to_string(),
        }
    }

    #[test]
    fn test_build_message_headers() {
        let message = SmtpMailTransport::build_message(envelope()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: taskbot@example.com"));
        assert!(raw.contains("To: alice@example.com"));
        assert!(raw.contains("Subject: New Task Assigned"));
        assert!(raw.contains("Hello Alice"));
    }

    #[tokio::test]
    async fn test_unreachable_relay_fails() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = MailConfig {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: port,
            starttls: false,
            timeout_secs: 2,
            ..Default::default()
        };
        let transport = SmtpMailTransport::new(&config).unwrap();

        let err = transport.send(envelope()).await.unwrap_err();
        assert!(matches!(err, TransportError::Smtp(_)));
    }
}
