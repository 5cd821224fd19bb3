//! SMS alerts through the Twilio REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{Notifier, NotifyError};
use crate::config::TwilioSection;

/// Twilio caps a single message body at this many characters
pub const MAX_MESSAGE_CHARS: usize = 1600;
const RECIPIENT_DIGITS: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 form
    pub from_phone: String,
    pub api_base: String,
}

impl TryFrom<&TwilioSection> for TwilioConfig {
    type Error = NotifyError;

    fn try_from(section: &TwilioSection) -> Result<Self, Self::Error> {
        let require = |value: &str, name: &str| {
            let value = value.trim();
            if value.is_empty() {
                Err(NotifyError::Configuration(format!("twilio {name} is not set")))
            } else {
                Ok(value.to_string())
            }
        };

        let from_phone = require(section.from_phone.as_str(), "from_phone")?;
        let from_phone = if from_phone.starts_with('+') { from_phone } else { format!("+1{from_phone}") };

        Ok(Self {
            account_sid: require(section.account_sid.as_str(), "account_sid")?,
            auth_token: require(section.auth_token.as_str(), "auth_token")?,
            from_phone,
            api_base: require(section.api_base.as_str(), "api_base")?,
        })
    }
}

pub struct TwilioNotifier {
    client: Client,
    config: TwilioConfig,
}

impl TwilioNotifier {
    pub fn new(config: TwilioConfig) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

fn validate_recipient(recipient: &str) -> Result<&str, NotifyError> {
    let recipient = recipient.trim();
    if recipient.len() == RECIPIENT_DIGITS && recipient.chars().all(|c| c.is_ascii_digit()) {
        Ok(recipient)
    } else {
        Err(NotifyError::InvalidRecipient(recipient.to_string()))
    }
}

fn validate_message(message: &str) -> Result<&str, NotifyError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(NotifyError::InvalidMessage("message is empty".to_string()));
    }
    let chars = message.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(NotifyError::InvalidMessage(format!(
            "{chars} characters exceeds the limit of {MAX_MESSAGE_CHARS}"
        )));
    }
    Ok(message)
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let recipient = validate_recipient(recipient)?;
        let message = validate_message(message)?;

        let to = format!("+1{recipient}");
        let form = [
            ("From", self.config.from_phone.as_str()),
            ("To", to.as_str()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status: status.as_u16(), body });
        }

        debug!(to = %to, status = status.as_u16(), "Twilio accepted message");
        Ok(())
    }
}
