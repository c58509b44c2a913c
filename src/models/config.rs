//! Application configuration structures.

use std::fs;
use std::path::Path;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
///
/// Everything here is non-secret and may live in a committed `config.toml`.
/// Credentials come from the environment (see [`crate::config::Environment`]).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and search page parsing settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Snapshot and archive locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message templates and channel endpoints
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Listing page capture settings
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if the file does not exist.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No config at {}. Using defaults.", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::config("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::config("fetcher.timeout_secs must be > 0"));
        }
        Selector::parse(&self.fetcher.listing_selector)
            .map_err(|e| AppError::selector(&self.fetcher.listing_selector, format!("{e:?}")))?;
        let id_pattern = compile_pattern("fetcher.id_pattern", &self.fetcher.id_pattern)?;
        if id_pattern.captures_len() < 2 {
            return Err(AppError::config(
                "fetcher.id_pattern must contain a capture group",
            ));
        }
        compile_pattern("fetcher.price_pattern", &self.fetcher.price_pattern)?;

        if self.storage.seen_file.trim().is_empty() {
            return Err(AppError::config("storage.seen_file is empty"));
        }
        if self.storage.archive_dir.trim().is_empty() {
            return Err(AppError::config("storage.archive_dir is empty"));
        }

        if self.notify.timeout_secs == 0 {
            return Err(AppError::config("notify.timeout_secs must be > 0"));
        }
        if self.notify.sms_max_chars == 0 {
            return Err(AppError::config("notify.sms_max_chars must be > 0"));
        }
        if self.notify.smtp_host.trim().is_empty() {
            return Err(AppError::config("notify.smtp_host is empty"));
        }
        url::Url::parse(&self.notify.sms_api_base)
            .map_err(|e| AppError::config(format!("notify.sms_api_base is invalid: {e}")))?;

        Ok(())
    }
}

fn compile_pattern(name: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::config(format!("{name} is invalid: {e}")))
}

/// Search page fetching and parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// CSS selector matching listing links on the search page
    #[serde(default = "defaults::listing_selector")]
    pub listing_selector: String,

    /// Regex whose first capture group is the listing identifier
    #[serde(default = "defaults::id_pattern")]
    pub id_pattern: String,

    /// Regex matching a displayed price
    #[serde(default = "defaults::price_pattern")]
    pub price_pattern: String,

    /// Title used when the link has no text
    #[serde(default = "defaults::default_title")]
    pub default_title: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            listing_selector: defaults::listing_selector(),
            id_pattern: defaults::id_pattern(),
            price_pattern: defaults::price_pattern(),
            default_title: defaults::default_title(),
        }
    }
}

/// File locations, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::seen_file")]
    pub seen_file: String,

    #[serde(default = "defaults::archive_dir")]
    pub archive_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            seen_file: defaults::seen_file(),
            archive_dir: defaults::archive_dir(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Per-channel delivery timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Email subject template (see `Listing::format`)
    #[serde(default = "defaults::subject_template")]
    pub subject_template: String,

    /// Message body template shared by both channels
    #[serde(default = "defaults::body_template")]
    pub body_template: String,

    /// SMS bodies are cut to this many characters
    #[serde(default = "defaults::sms_max_chars")]
    pub sms_max_chars: usize,

    #[serde(default = "defaults::smtp_host")]
    pub smtp_host: String,

    #[serde(default = "defaults::smtp_port")]
    pub smtp_port: u16,

    /// Base URL of the SMS provider REST API
    #[serde(default = "defaults::sms_api_base")]
    pub sms_api_base: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::timeout(),
            subject_template: defaults::subject_template(),
            body_template: defaults::body_template(),
            sms_max_chars: defaults::sms_max_chars(),
            smtp_host: defaults::smtp_host(),
            smtp_port: defaults::smtp_port(),
            sms_api_base: defaults::sms_api_base(),
        }
    }
}

/// Listing page capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Save page HTML and images of each new listing
    #[serde(default = "defaults::capture_enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::max_images")]
    pub max_images: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::capture_enabled(),
            max_images: defaults::max_images(),
        }
    }
}

mod defaults {
    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; ListingWatch/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn listing_selector() -> String {
        "a[href*='/a/']".into()
    }
    pub fn id_pattern() -> String {
        r"[_/-]([0-9]{6,})".into()
    }
    pub fn price_pattern() -> String {
        r"[$£€]\s?[0-9][0-9,]*(?:\.[0-9]{2})?".into()
    }
    pub fn default_title() -> String {
        "Untitled listing".into()
    }

    // Storage defaults
    pub fn seen_file() -> String {
        "seen_listings.json".into()
    }
    pub fn archive_dir() -> String {
        "archives".into()
    }

    // Notify defaults
    pub fn subject_template() -> String {
        "[Listing] New listing {id}".into()
    }
    pub fn body_template() -> String {
        "{title}\n{price}\n{url}".into()
    }
    pub fn sms_max_chars() -> usize {
        1600
    }
    pub fn smtp_host() -> String {
        "smtp.gmail.com".into()
    }
    pub fn smtp_port() -> u16 {
        465
    }
    pub fn sms_api_base() -> String {
        "https://api.twilio.com".into()
    }

    // Capture defaults
    pub fn capture_enabled() -> bool {
        true
    }
    pub fn max_images() -> usize {
        15
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetcher.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector() {
        let mut config = Config::default();
        config.fetcher.listing_selector = "[[invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_id_pattern_without_group() {
        let mut config = Config::default();
        config.fetcher.id_pattern = r"[0-9]{6,}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.notify.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fetcher]
            timeout_secs = 5

            [capture]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.fetcher.timeout_secs, 5);
        assert_eq!(config.fetcher.listing_selector, "a[href*='/a/']");
        assert!(!config.capture.enabled);
        assert_eq!(config.capture.max_images, 15);
        assert_eq!(config.storage.seen_file, "seen_listings.json");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/config.toml").unwrap();
        assert_eq!(config.notify.smtp_port, 465);
    }
}
