//! Outbound alert delivery.

pub mod logging;
pub mod twilio;

pub use logging::LogNotifier;
pub use twilio::{TwilioConfig, TwilioNotifier};

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{NotifierBackend, NotifierSection};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("notifier is not configured: {0}")]
    Configuration(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("gateway rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends short text alerts to a user
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to `recipient`. Failures are reported, never retried.
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

/// Build the notifier selected in the configuration
pub fn from_config(section: &NotifierSection) -> Result<Arc<dyn Notifier>, NotifyError> {
    Ok(match section.backend {
        NotifierBackend::Log => Arc::new(LogNotifier),
        NotifierBackend::Twilio => {
            Arc::new(TwilioNotifier::new(TwilioConfig::try_from(&section.twilio)?)?)
        }
    })
}
