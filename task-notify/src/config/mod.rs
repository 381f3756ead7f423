//! Process configuration.
//!
//! Everything is sourced from environment variables (optionally loaded from a
//! `.env` file by the binary). Parsing goes through a lookup function so the
//! same code path is exercised by tests without mutating the process
//! environment.
//!
//! Unparseable numeric or boolean values fall back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::server::ApiServerConfig;

/// Default subject line for assignment mails.
pub const DEFAULT_MAIL_SUBJECT: &str = "New Task Assigned";

/// Default body template for assignment mails.
pub const DEFAULT_MAIL_BODY: &str =
    "Hello {name},\n\nYou have been assigned a new task:\n\n{task}\n\nRegards,\nTaskBot";

/// Outbound mail relay and template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host.
    pub smtp_host: String,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// Upgrade the session with STARTTLS before authenticating.
    pub starttls: bool,
    /// SMTP username.
    pub smtp_username: Option<String>,
    /// SMTP password.
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    /// Per-command timeout for the SMTP session.
    pub timeout_secs: u64,
    /// Sender address.
    pub from_address: String,
    /// Subject template (`{name}`, `{email}`, `{task}` placeholders).
    pub subject_template: String,
    /// Plain-text body template (`{name}`, `{email}`, `{task}` placeholders).
    pub body_template: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            starttls: true,
            smtp_username: None,
            smtp_password: None,
            timeout_secs: 30,
            from_address: String::new(),
            subject_template: DEFAULT_MAIL_SUBJECT.to_string(),
            body_template: DEFAULT_MAIL_BODY.to_string(),
        }
    }
}

impl MailConfig {
    /// SMTP command timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether a username/password pair is configured.
    pub fn has_credentials(&self) -> bool {
        self.smtp_username.is_some() && self.smtp_password.is_some()
    }

    /// Read the mail section through `lookup`.
    ///
    /// Supported variables:
    /// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_STARTTLS`, `SMTP_TIMEOUT_SECS`
    /// - `EMAIL_USER`, `EMAIL_PASS` (credentials; `EMAIL_USER` is also the default sender)
    /// - `MAIL_FROM`, `MAIL_SUBJECT`, `MAIL_BODY`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let username = non_empty(&lookup, "EMAIL_USER");

        Self {
            smtp_host: non_empty(&lookup, "SMTP_HOST").unwrap_or(defaults.smtp_host),
            smtp_port: parsed(&lookup, "SMTP_PORT").unwrap_or(defaults.smtp_port),
            starttls: flag(&lookup, "SMTP_STARTTLS").unwrap_or(defaults.starttls),
            timeout_secs: parsed(&lookup, "SMTP_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            from_address: non_empty(&lookup, "MAIL_FROM")
                .or_else(|| username.clone())
                .unwrap_or(defaults.from_address),
            smtp_username: username,
            smtp_password: non_empty(&lookup, "EMAIL_PASS"),
            subject_template: non_empty(&lookup, "MAIL_SUBJECT")
                .unwrap_or(defaults.subject_template),
            // .env files carry the body on one line with literal `\n`.
            body_template: non_empty(&lookup, "MAIL_BODY")
                .map(|body| body.replace("\\n", "\n"))
                .unwrap_or(defaults.body_template),
        }
    }
}

/// Live subscriber (WebSocket) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound frame queue per subscriber. A full queue drops the frame.
    pub queue_capacity: usize,
    /// Ping interval for connected clients.
    pub heartbeat_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            heartbeat_secs: 30,
        }
    }
}

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: parsed::<usize>(&lookup, "WS_QUEUE_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.queue_capacity),
            heartbeat_secs: parsed::<u64>(&lookup, "WS_HEARTBEAT_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.heartbeat_secs),
        }
    }
}

/// Complete process configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub api: ApiServerConfig,
    pub mail: MailConfig,
    pub realtime: RealtimeConfig,
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api: ApiServerConfig::from_lookup(&lookup),
            mail: MailConfig::from_lookup(&lookup),
            realtime: RealtimeConfig::from_lookup(&lookup),
            log_dir: non_empty(&lookup, "LOG_DIR").map(PathBuf::from),
        }
    }
}

pub(crate) fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

pub(crate) fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

pub(crate) fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    lookup(key).and_then(
        |value| match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.mail.smtp_host, "smtp.gmail.com");
        assert_eq!(config.mail.smtp_port, 587);
        assert!(config.mail.starttls);
        assert!(!config.mail.has_credentials());
        assert_eq!(config.mail.subject_template, "New Task Assigned");
        assert_eq!(config.realtime.queue_capacity, 64);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_email_user_is_default_sender() {
        let mail = MailConfig::from_lookup(lookup_from(&[
            ("EMAIL_USER", "bot@example.com"),
            ("EMAIL_PASS", "secret"),
        ]));
        assert_eq!(mail.from_address, "bot@example.com");
        assert_eq!(mail.smtp_username.as_deref(), Some("bot@example.com"));
        assert!(mail.has_credentials());
    }

    #[test]
    fn test_mail_from_overrides_user() {
        let mail = MailConfig::from_lookup(lookup_from(&[
            ("EMAIL_USER", "login@example.com"),
            ("MAIL_FROM", "noreply@example.com"),
        ]));
        assert_eq!(mail.from_address, "noreply@example.com");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SMTP_PORT", "not-a-port"),
            ("SMTP_STARTTLS", "maybe"),
            ("WS_QUEUE_CAPACITY", "0"),
            ("API_PORT", "99999"),
        ]));
        assert_eq!(config.mail.smtp_port, 587);
        assert!(config.mail.starttls);
        assert_eq!(config.realtime.queue_capacity, 64);
        assert_eq!(config.api.port, ApiServerConfig::default().port);
    }

    #[test]
    fn test_body_template_unescapes_newlines() {
        let mail = MailConfig::from_lookup(lookup_from(&[("MAIL_BODY", "Hi {name}\\n{task}")]));
        assert_eq!(mail.body_template, "Hi {name}\n{task}");
    }

    #[test]
    fn test_flag_parsing() {
        let lookup = lookup_from(&[("A", "off"), ("B", " YES "), ("C", "")]);
        assert_eq!(flag(&lookup, "A"), Some(false));
        assert_eq!(flag(&lookup, "B"), Some(true));
        assert_eq!(flag(&lookup, "C"), None);
        assert_eq!(flag(&lookup, "D"), None);
    }

    #[test]
    fn test_password_not_serialized() {
        let mail = MailConfig {
            smtp_password: Some("hunter2".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&mail).unwrap();
        assert!(!json.contains("hunter2"));
    }
}
