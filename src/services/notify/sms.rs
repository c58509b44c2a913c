//! SMS channel over the Twilio REST API.

use async_trait::async_trait;
use reqwest::Client;

use super::Channel;
use crate::config::SmsCredentials;
use crate::error::{ChannelError, ChannelKind};
use crate::models::{NotificationEvent, NotifyConfig};
use crate::utils::truncate_chars;

/// Sends the alert body as a text message.
pub struct SmsChannel {
    client: Client,
    endpoint: String,
    creds: SmsCredentials,
    max_chars: usize,
}

impl SmsChannel {
    pub fn new(client: Client, creds: &SmsCredentials, config: &NotifyConfig) -> Self {
        let endpoint = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.sms_api_base.trim_end_matches('/'),
            creds.account_sid
        );
        Self {
            client,
            endpoint,
            creds: creds.clone(),
            max_chars: config.sms_max_chars,
        }
    }

    fn error(cause: impl std::fmt::Display) -> ChannelError {
        ChannelError::new(ChannelKind::Sms, cause)
    }
}

#[async_trait]
impl Channel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, event: &NotificationEvent) -> std::result::Result<(), ChannelError> {
        let body = truncate_chars(&event.body, self.max_chars);
        let form = [
            ("To", self.creds.to.as_str()),
            ("From", self.creds.from.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.creds.account_sid, Some(&self.creds.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(Self::error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Self::error(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate_chars(detail.trim(), 200)
            )));
        }
        Ok(())
    }
}
