//! Renders assignment mails from templates.

use std::str::FromStr;

use lettre::Address;

use super::{AddressRole, CompositionError, MailEnvelope};
use crate::config::MailConfig;
use crate::notification::events::TaskAssignment;

/// Builds [`MailEnvelope`]s from assignments.
///
/// Templates understand `{name}`, `{email}` and `{task}`. Substitution is a
/// single pass, so placeholder text inside user-supplied values is left as is.
#[derive(Debug, Clone)]
pub struct MailComposer {
    from_address: String,
    subject_template: String,
    body_template: String,
}

impl MailComposer {
    pub fn new(
        from_address: impl Into<String>,
        subject_template: impl Into<String>,
        body_template: impl Into<String>,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            subject_template: subject_template.into(),
            body_template: body_template.into(),
        }
    }

    pub fn from_config(config: &MailConfig) -> Self {
        Self::new(
            config.from_address.clone(),
            config.subject_template.clone(),
            config.body_template.clone(),
        )
    }

    /// Parse the configured sender address.
    pub fn sender(&self) -> Result<Address, CompositionError> {
        parse_address(AddressRole::Sender, &self.from_address)
    }

    /// Compose the mail for `assignment`. Deterministic and free of I/O.
    pub fn compose(&self, assignment: &TaskAssignment) -> Result<MailEnvelope, CompositionError> {
        let from = self.sender()?;
        let to = parse_address(AddressRole::Recipient, assignment.assignee_email())?;

        Ok(MailEnvelope {
            from,
            to,
            subject: render(&self.subject_template, assignment),
            body: render(&self.body_template, assignment),
        })
    }
}

fn parse_address(role: AddressRole, value: &str) -> Result<Address, CompositionError> {
    Address::from_str(value.trim()).map_err(|e| CompositionError::InvalidAddress {
        role,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn render(template: &str, assignment: &TaskAssignment) -> String {
    let placeholders = [
        ("{name}", assignment.assignee_name()),
        ("{email}", assignment.assignee_email()),
        ("{task}", assignment.task_description()),
    ];

    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];

        match placeholders
            .iter()
            .find(|(token, _)| rest.starts_with(*token))
        {
            Some((token, value)) => {
                out.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
