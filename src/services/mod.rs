//! Service layer for the watcher.
//!
//! This module contains the I/O-facing logic for:
//! - Search page fetching (`SearchPageFetcher`)
//! - Listing page capture (`PageCapture`)
//! - Email and SMS notifications (`Notifier`)

mod capture;
mod listings;
pub mod notify;

pub use capture::PageCapture;
pub use listings::{ListingParser, ListingSource, SearchPageFetcher};
pub use notify::{Channel, ChannelOutcome, NotificationResult, NotificationStats, Notifier};
