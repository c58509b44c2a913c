//! Listing data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A marketplace listing found on the search page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    /// Source-assigned identifier
    pub id: String,

    /// Listing title as shown on the search card
    pub title: String,

    /// Asking price, when the card shows one
    #[serde(default)]
    pub price: Option<String>,

    /// Absolute URL of the listing page
    pub url: String,

    /// When this run first saw the listing
    pub first_seen: DateTime<Utc>,
}

impl Listing {
    /// Format listing for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{title}`, `{price}`, `{url}`, `{first_seen}`
    ///
    /// Lines left empty by a missing price are dropped.
    pub fn format(&self, template: &str) -> String {
        let rendered = template
            .replace("{id}", &self.id)
            .replace("{title}", &self.title)
            .replace("{price}", self.price.as_deref().unwrap_or(""))
            .replace("{url}", &self.url)
            .replace(
                "{first_seen}",
                &self.first_seen.format("%Y-%m-%d %H:%M:%S").to_string(),
            );

        rendered
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Archive partition key (UTC date of first sighting).
    pub fn partition_key(&self) -> String {
        self.first_seen.format("%Y-%m-%d").to_string()
    }
}

/// One alert, built from a newly detected listing and consumed by the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub listing_id: String,
    pub subject: String,
    pub body: String,
}

impl NotificationEvent {
    pub fn from_listing(listing: &Listing, subject_template: &str, body_template: &str) -> Self {
        Self {
            listing_id: listing.id.clone(),
            subject: listing.format(subject_template),
            body: listing.format(body_template),
        }
    }
}
