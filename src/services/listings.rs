// src/services/listings.rs

//! Search page fetcher.
//!
//! Downloads the configured search page and extracts listing cards using the
//! configured CSS selector and identifier pattern.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{FetcherConfig, Listing};
use crate::utils::url::{extract_listing_id, resolve};
use crate::utils::{http, normalize_whitespace};

/// Anything that can produce the current set of listings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch listing candidates in page order.
    async fn fetch(&self) -> Result<Vec<Listing>>;
}

/// Extracts listings from a search results document.
#[derive(Debug, Clone)]
pub struct ListingParser {
    selector: Selector,
    id_pattern: Regex,
    price_pattern: Regex,
    default_title: String,
}

impl ListingParser {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let selector = Selector::parse(&config.listing_selector)
            .map_err(|e| AppError::selector(&config.listing_selector, format!("{e:?}")))?;
        let id_pattern = Regex::new(&config.id_pattern)
            .map_err(|e| AppError::config(format!("fetcher.id_pattern is invalid: {e}")))?;
        let price_pattern = Regex::new(&config.price_pattern)
            .map_err(|e| AppError::config(format!("fetcher.price_pattern is invalid: {e}")))?;

        Ok(Self {
            selector,
            id_pattern,
            price_pattern,
            default_title: config.default_title.clone(),
        })
    }

    /// Parse a search page. Several links often point at the same card; only
    /// the first one per identifier is kept.
    pub fn parse(&self, html: &str, base_url: &Url, seen_at: DateTime<Utc>) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let mut ids = HashSet::new();
        let mut listings = Vec::new();

        for anchor in document.select(&self.selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve(base_url, href) else {
                continue;
            };
            let Some(id) = extract_listing_id(&url, &self.id_pattern) else {
                continue;
            };
            if !ids.insert(id.clone()) {
                continue;
            }

            let text = element_text(&anchor);
            let title = if text.is_empty() {
                self.default_title.clone()
            } else {
                text.clone()
            };
            let price = self.find_price(&text, &anchor);

            listings.push(Listing {
                id,
                title,
                price,
                url,
                first_seen: seen_at,
            });
        }

        listings
    }

    fn find_price(&self, anchor_text: &str, anchor: &ElementRef<'_>) -> Option<String> {
        if let Some(m) = self.price_pattern.find(anchor_text) {
            return Some(m.as_str().to_string());
        }
        let parent = anchor.parent().and_then(ElementRef::wrap)?;
        let parent_text = element_text(&parent);
        self.price_pattern
            .find(&parent_text)
            .map(|m| m.as_str().to_string())
    }
}

/// Text of an element with its text nodes joined by single spaces.
fn element_text(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Fetches listings from a single search URL over HTTP.
pub struct SearchPageFetcher {
    client: Client,
    search_url: Url,
    parser: ListingParser,
}

impl SearchPageFetcher {
    pub fn new(client: Client, search_url: Url, config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client,
            search_url,
            parser: ListingParser::new(config)?,
        })
    }
}

#[async_trait]
impl ListingSource for SearchPageFetcher {
    async fn fetch(&self) -> Result<Vec<Listing>> {
        let url = self.search_url.as_str();
        log::debug!("Fetching search page {}", url);

        let body = http::fetch_text(&self.client, url).await?;
        if body.trim().is_empty() {
            return Err(AppError::fetch(url, "empty response body"));
        }

        let listings = self.parser.parse(&body, &self.search_url, Utc::now());
        log::info!("Found {} unique listing link(s) on page", listings.len());
        Ok(listings)
    }
}
