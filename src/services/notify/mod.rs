// src/services/notify/mod.rs

//! Notification fan-out.
//!
//! Every new listing is announced on each registered channel. Channels run
//! concurrently and fail independently; a failure is reported in the
//! [`NotificationResult`] and never aborts the run.

mod email;
mod sms;

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::config::Environment;
use crate::error::{ChannelError, ChannelKind};
use crate::models::{Listing, NotificationEvent, NotifyConfig};

pub use email::EmailChannel;
pub use sms::SmsChannel;

/// A single delivery mechanism.
#[async_trait]
pub trait Channel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn send(&self, event: &NotificationEvent) -> std::result::Result<(), ChannelError>;
}

/// What happened on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    /// Channel has no credentials configured
    Skipped,
    Failed(ChannelError),
}

/// Per-channel outcomes for one listing.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    pub listing_id: String,
    pub outcomes: Vec<(ChannelKind, ChannelOutcome)>,
}

impl NotificationResult {
    pub fn outcome(&self, channel: ChannelKind) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(kind, _)| *kind == channel)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelError> {
        self.outcomes.iter().filter_map(|(_, outcome)| match outcome {
            ChannelOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }
}

/// Delivery counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationStats {
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl NotificationStats {
    pub fn record(&mut self, result: &NotificationResult) {
        for (_, outcome) in &result.outcomes {
            match outcome {
                ChannelOutcome::Delivered => self.delivered += 1,
                ChannelOutcome::Failed(_) => self.failed += 1,
                ChannelOutcome::Skipped => self.skipped += 1,
            }
        }
    }
}

/// Fans a listing out to every channel.
pub struct Notifier {
    channels: Vec<(ChannelKind, Option<Box<dyn Channel>>)>,
    timeout: Duration,
    subject_template: String,
    body_template: String,
}

impl Notifier {
    /// Create a notifier with no channels registered.
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            channels: Vec::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            subject_template: config.subject_template.clone(),
            body_template: config.body_template.clone(),
        }
    }

    /// Register a channel slot. `None` marks the channel as disabled so it
    /// still shows up as skipped in every result.
    pub fn with_channel(mut self, kind: ChannelKind, channel: Option<Box<dyn Channel>>) -> Self {
        self.channels.push((kind, channel));
        self
    }

    /// Build email and SMS channels from environment credentials. A channel
    /// whose credentials cannot be used fails on every send instead of
    /// stopping the other one.
    pub fn from_environment(
        config: &NotifyConfig,
        env: &Environment,
        client: reqwest::Client,
    ) -> Self {
        let email = match &env.email {
            Some(creds) => match EmailChannel::new(creds, config) {
                Ok(channel) => Some(Box::new(channel) as Box<dyn Channel>),
                Err(e) => {
                    log::warn!("Email channel unusable: {}", e);
                    Some(Box::new(UnusableChannel::new(ChannelKind::Email, e)) as Box<dyn Channel>)
                }
            },
            None => {
                log::warn!("Email channel disabled (missing credentials)");
                None
            }
        };
        let sms = match &env.sms {
            Some(creds) => {
                Some(Box::new(SmsChannel::new(client, creds, config)) as Box<dyn Channel>)
            }
            None => {
                log::warn!("SMS channel disabled (missing credentials)");
                None
            }
        };

        Self::new(config)
            .with_channel(ChannelKind::Email, email)
            .with_channel(ChannelKind::Sms, sms)
    }

    /// Announce one listing on all channels.
    pub async fn notify(&self, listing: &Listing) -> NotificationResult {
        let event =
            NotificationEvent::from_listing(listing, &self.subject_template, &self.body_template);

        let deliveries = self.channels.iter().map(|(kind, channel)| {
            let event = &event;
            async move {
                let outcome = match channel {
                    Some(channel) => self.deliver(channel.as_ref(), event).await,
                    None => ChannelOutcome::Skipped,
                };
                (*kind, outcome)
            }
        });
        let outcomes = join_all(deliveries).await;

        for (kind, outcome) in &outcomes {
            match outcome {
                ChannelOutcome::Delivered => log::info!("{} sent for {}", kind, listing.id),
                ChannelOutcome::Skipped => log::debug!("{} skipped for {}", kind, listing.id),
                ChannelOutcome::Failed(err) => log::warn!("{} (listing {})", err, listing.id),
            }
        }

        NotificationResult {
            listing_id: listing.id.clone(),
            outcomes,
        }
    }

    async fn deliver(&self, channel: &dyn Channel, event: &NotificationEvent) -> ChannelOutcome {
        match tokio::time::timeout(self.timeout, channel.send(event)).await {
            Ok(Ok(())) => ChannelOutcome::Delivered,
            Ok(Err(err)) => ChannelOutcome::Failed(err),
            Err(_) => ChannelOutcome::Failed(ChannelError::new(
                channel.kind(),
                format!("timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

/// Stands in for a channel whose settings were rejected at startup.
struct UnusableChannel {
    kind: ChannelKind,
    cause: String,
}

impl UnusableChannel {
    fn new(kind: ChannelKind, cause: impl std::fmt::Display) -> Self {
        Self {
            kind,
            cause: cause.to_string(),
        }
    }
}

#[async_trait]
impl Channel for UnusableChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, _event: &NotificationEvent) -> std::result::Result<(), ChannelError> {
        Err(ChannelError::new(self.kind, &self.cause))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Channel doubles shared with the pipeline tests.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Records every event it is asked to send.
    #[derive(Clone)]
    pub struct RecordingChannel {
        kind: ChannelKind,
        pub sent: Arc<Mutex<Vec<NotificationEvent>>>,
    }

    impl RecordingChannel {
        pub fn new(kind: ChannelKind) -> Self {
            Self {
                kind,
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn sent_ids(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.listing_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, event: &NotificationEvent) -> std::result::Result<(), ChannelError> {
            self.sent.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Always fails.
    pub struct FailingChannel(pub ChannelKind);

    #[async_trait]
    impl Channel for FailingChannel {
        fn kind(&self) -> ChannelKind {
            self.0
        }

        async fn send(&self, _event: &NotificationEvent) -> std::result::Result<(), ChannelError> {
            Err(ChannelError::new(self.0, "535 authentication failed"))
        }
    }

    /// Never finishes within any sane timeout.
    pub struct HangingChannel(pub ChannelKind);

    #[async_trait]
    impl Channel for HangingChannel {
        fn kind(&self) -> ChannelKind {
            self.0
        }

        async fn send(&self, _event: &NotificationEvent) -> std::result::Result<(), ChannelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::Utc;

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: "2020 Mazda 3 GS".to_string(),
            price: Some("$21,000".to_string()),
            url: format!("https://example.com/a/mazda/{id}"),
            first_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_both_channels_delivered() {
        let email = RecordingChannel::new(ChannelKind::Email);
        let sms = RecordingChannel::new(ChannelKind::Sms);
        let notifier = Notifier::new(&NotifyConfig::default())
            .with_channel(ChannelKind::Email, Some(Box::new(email.clone())))
            .with_channel(ChannelKind::Sms, Some(Box::new(sms.clone())));

        let result = notifier.notify(&listing("1234567")).await;
        assert_eq!(result.outcome(ChannelKind::Email), Some(&ChannelOutcome::Delivered));
        assert_eq!(result.outcome(ChannelKind::Sms), Some(&ChannelOutcome::Delivered));

        let sent = email.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "[Listing] New listing 1234567");
        assert_eq!(
            sent[0].body,
            "2020 Mazda 3 GS\n$21,000\nhttps://example.com/a/mazda/1234567"
        );
    }

    #[tokio::test]
    async fn test_email_failure_does_not_block_sms() {
        let sms = RecordingChannel::new(ChannelKind::Sms);
        let notifier = Notifier::new(&NotifyConfig::default())
            .with_channel(
                ChannelKind::Email,
                Some(Box::new(FailingChannel(ChannelKind::Email))),
            )
            .with_channel(ChannelKind::Sms, Some(Box::new(sms.clone())));

        let result = notifier.notify(&listing("1234567")).await;
        assert!(matches!(
            result.outcome(ChannelKind::Email),
            Some(ChannelOutcome::Failed(err)) if err.channel == ChannelKind::Email
        ));
        assert_eq!(result.outcome(ChannelKind::Sms), Some(&ChannelOutcome::Delivered));
        assert_eq!(sms.sent_ids(), vec!["1234567"]);
        assert_eq!(result.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_channel_is_skipped() {
        let notifier = Notifier::new(&NotifyConfig::default())
            .with_channel(ChannelKind::Email, None)
            .with_channel(
                ChannelKind::Sms,
                Some(Box::new(RecordingChannel::new(ChannelKind::Sms))),
            );

        let result = notifier.notify(&listing("7654321")).await;
        assert_eq!(result.outcome(ChannelKind::Email), Some(&ChannelOutcome::Skipped));

        let mut stats = NotificationStats::default();
        stats.record(&result);
        assert_eq!(
            stats,
            NotificationStats {
                delivered: 1,
                failed: 0,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_email_address_only_fails_email() {
        let env = Environment {
            search_url: url::Url::parse("https://example.com/search").unwrap(),
            email: Some(crate::config::EmailCredentials {
                sender: "me at gmail".to_string(),
                app_password: "app-password".to_string(),
                recipient: "me at gmail".to_string(),
            }),
            sms: None,
        };
        let notifier =
            Notifier::from_environment(&NotifyConfig::default(), &env, reqwest::Client::new());

        let result = notifier.notify(&listing("2222222")).await;
        match result.outcome(ChannelKind::Email) {
            Some(ChannelOutcome::Failed(err)) => {
                assert_eq!(err.channel, ChannelKind::Email);
                assert!(err.cause.contains("sender address is invalid"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(result.outcome(ChannelKind::Sms), Some(&ChannelOutcome::Skipped));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_channel_times_out() {
        let config = NotifyConfig {
            timeout_secs: 2,
            ..NotifyConfig::default()
        };
        let sms = RecordingChannel::new(ChannelKind::Sms);
        let notifier = Notifier::new(&config)
            .with_channel(
                ChannelKind::Email,
                Some(Box::new(HangingChannel(ChannelKind::Email))),
            )
            .with_channel(ChannelKind::Sms, Some(Box::new(sms.clone())));

        let result = notifier.notify(&listing("1111111")).await;
        match result.outcome(ChannelKind::Email) {
            Some(ChannelOutcome::Failed(err)) => assert!(err.cause.contains("timed out")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sms.sent_ids(), vec!["1111111"]);
    }
}
