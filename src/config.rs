// src/config.rs

//! Environment-provided settings.
//!
//! Credentials and the search URL arrive as environment variables (CI
//! secrets). They are read once, here, into an [`Environment`] that is passed
//! down explicitly; nothing below this module touches `std::env`.

use std::fmt;

use url::Url;

use crate::error::{AppError, Result};

pub const SEARCH_URL: &str = "SEARCH_URL";
pub const GMAIL_USER: &str = "GMAIL_USER";
pub const GMAIL_APP_PASSWORD: &str = "GMAIL_APP_PASSWORD";
pub const NOTIFY_EMAIL_TO: &str = "NOTIFY_EMAIL_TO";
pub const TWILIO_SID: &str = "TWILIO_SID";
pub const TWILIO_TOKEN: &str = "TWILIO_TOKEN";
pub const TWILIO_FROM: &str = "TWILIO_FROM";
pub const TWILIO_TO: &str = "TWILIO_TO";

/// SMTP login for the email channel.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailCredentials {
    pub sender: String,
    pub app_password: String,
    pub recipient: String,
}

impl fmt::Debug for EmailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailCredentials")
            .field("sender", &self.sender)
            .field("app_password", &"<redacted>")
            .field("recipient", &self.recipient)
            .finish()
    }
}

/// SMS provider account for the SMS channel.
#[derive(Clone, PartialEq, Eq)]
pub struct SmsCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
}

impl fmt::Debug for SmsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsCredentials")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Settings read from the process environment.
#[derive(Debug, Clone)]
pub struct Environment {
    pub search_url: Url,
    /// `None` disables the email channel
    pub email: Option<EmailCredentials>,
    /// `None` disables the SMS channel
    pub sms: Option<SmsCredentials>,
}

impl Environment {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup.
    ///
    /// Empty and whitespace-only values count as unset, since CI runners
    /// expand missing secrets to empty strings.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get(SEARCH_URL).ok_or_else(|| {
            AppError::config(format!("Environment variable {SEARCH_URL} is missing"))
        })?;
        let search_url = Url::parse(&raw_url)
            .map_err(|e| AppError::config(format!("{SEARCH_URL} is not a valid URL: {e}")))?;
        if !matches!(search_url.scheme(), "http" | "https") {
            return Err(AppError::config(format!(
                "{SEARCH_URL} must be an http(s) URL"
            )));
        }

        let email = match (get(GMAIL_USER), get(GMAIL_APP_PASSWORD)) {
            (Some(sender), Some(app_password)) => Some(EmailCredentials {
                recipient: get(NOTIFY_EMAIL_TO).unwrap_or_else(|| sender.clone()),
                sender,
                app_password,
            }),
            _ => None,
        };

        let sms = match (
            get(TWILIO_SID),
            get(TWILIO_TOKEN),
            get(TWILIO_FROM),
            get(TWILIO_TO),
        ) {
            (Some(account_sid), Some(auth_token), Some(from), Some(to)) => Some(SmsCredentials {
                account_sid,
                auth_token,
                from,
                to,
            }),
            _ => None,
        };

        Ok(Self {
            search_url,
            email,
            sms,
        })
    }
}
