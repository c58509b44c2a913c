// src/services/capture.rs

//! Listing page capture.
//!
//! Downloads the detail page of a new listing together with its first few
//! images so the archive keeps a copy after the listing is taken down.

use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{CaptureConfig, Listing, PageBundle};
use crate::utils::http;

/// Service for capturing listing detail pages.
pub struct PageCapture {
    client: Client,
    image_selector: Selector,
    max_images: usize,
}

impl PageCapture {
    pub fn new(client: Client, config: &CaptureConfig) -> Result<Self> {
        let image_selector = Selector::parse("img[src]")
            .map_err(|e| AppError::selector("img[src]", format!("{e:?}")))?;
        Ok(Self {
            client,
            image_selector,
            max_images: config.max_images,
        })
    }

    /// Fetch the page and up to `max_images` images. A failed image download
    /// is logged and skipped; a failed page download is an error.
    pub async fn capture(&self, listing: &Listing) -> Result<PageBundle> {
        let html = http::fetch_text(&self.client, &listing.url).await?;
        let image_urls = self.image_urls(&html);

        let mut images = Vec::with_capacity(image_urls.len());
        for url in &image_urls {
            match http::fetch_bytes(&self.client, url).await {
                Ok(bytes) => images.push(bytes),
                Err(e) => log::warn!("Image fetch failed for {}: {}", listing.id, e),
            }
        }

        log::debug!(
            "Captured {} ({} of {} images)",
            listing.id,
            images.len(),
            image_urls.len()
        );
        Ok(PageBundle::new(listing, html, images))
    }

    /// Absolute image URLs in document order, capped at `max_images`.
    fn image_urls(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.image_selector)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| src.starts_with("http"))
            .take(self.max_images)
            .map(str::to_string)
            .collect()
    }
}
