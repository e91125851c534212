use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

/// Message templates the identity service sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    PasswordResetCode,
    PartnerApproved,
    PartnerRejected,
}

impl Template {
    pub fn id(&self) -> &'static str {
        match self {
            Template::PasswordResetCode => "password_reset_code",
            Template::PartnerApproved => "partner_approved",
            Template::PartnerRejected => "partner_rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub template: Template,
    pub params: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(recipient: impl Into<String>, template: Template) -> Self {
        Self {
            recipient: recipient.into(),
            template,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound delivery (email, SMS, ...) lives behind this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Development notifier: records the dispatch in the log and reports success.
/// Parameters are not logged since they may carry reset codes.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            template = notification.template.id(),
            "notification dispatched (log only)"
        );
        Ok(())
    }
}
