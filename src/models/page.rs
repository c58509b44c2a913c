//! Captured listing page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Listing;

/// Written next to the captured page as `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMetadata {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub price: Option<String>,
    pub saved: DateTime<Utc>,
    pub image_count: usize,
}

/// Detail page HTML and images of one listing, ready to be stored.
#[derive(Debug, Clone)]
pub struct PageBundle {
    pub metadata: PageMetadata,
    pub html: String,
    pub images: Vec<Vec<u8>>,
}

impl PageBundle {
    pub fn new(listing: &Listing, html: String, images: Vec<Vec<u8>>) -> Self {
        Self {
            metadata: PageMetadata {
                id: listing.id.clone(),
                url: listing.url.clone(),
                title: listing.title.clone(),
                price: listing.price.clone(),
                saved: Utc::now(),
                image_count: images.len(),
            },
            html,
            images,
        }
    }

    pub fn listing_id(&self) -> &str {
        &self.metadata.id
    }
}
