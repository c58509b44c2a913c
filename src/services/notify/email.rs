//! Email channel over authenticated SMTP.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, Message, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

use super::Channel;
use crate::config::EmailCredentials;
use crate::error::{AppError, ChannelError, ChannelKind, Result};
use crate::models::{NotificationEvent, NotifyConfig};

/// Sends plain-text alerts from the configured account.
pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    /// Malformed addresses or SMTP host are configuration errors.
    pub fn new(creds: &EmailCredentials, config: &NotifyConfig) -> Result<Self> {
        let from: Mailbox = creds
            .sender
            .parse()
            .map_err(|e| AppError::config(format!("email sender address is invalid: {e}")))?;
        let to: Mailbox = creds
            .recipient
            .parse()
            .map_err(|e| AppError::config(format!("email recipient address is invalid: {e}")))?;

        // `relay` speaks implicit TLS, which is what port 465 expects
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| AppError::config(format!("SMTP host is invalid: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                creds.sender.clone(),
                creds.app_password.clone(),
            ))
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self { mailer, from, to })
    }

    fn build_message(&self, event: &NotificationEvent) -> std::result::Result<Message, ChannelError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(event.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(event.body.clone())
            .map_err(|e| ChannelError::new(ChannelKind::Email, format!("build email: {e}")))
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, event: &NotificationEvent) -> std::result::Result<(), ChannelError> {
        let message = self.build_message(event)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| ChannelError::new(ChannelKind::Email, format!("send email: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(sender: &str) -> EmailCredentials {
        EmailCredentials {
            sender: sender.to_string(),
            app_password: "abcd efgh ijkl mnop".to_string(),
            recipient: sender.to_string(),
        }
    }

    #[test]
    fn test_invalid_sender_is_config_error() {
        let result = EmailChannel::new(&creds("not an address"), &NotifyConfig::default());
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_message_headers_and_body() {
        let channel = EmailChannel::new(&creds("watcher@example.com"), &NotifyConfig::default())
            .unwrap();
        let event = NotificationEvent {
            listing_id: "1234567".to_string(),
            subject: "[Listing] New listing 1234567".to_string(),
            body: "2018 Subaru Outback\nhttps://example.com/a/1234567".to_string(),
        };

        let message = channel.build_message(&event).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: watcher@example.com"));
        assert!(raw.contains("To: watcher@example.com"));
        assert!(raw.contains("Subject: [Listing] New listing 1234567"));
        assert!(raw.contains("2018 Subaru Outback"));
    }
}
