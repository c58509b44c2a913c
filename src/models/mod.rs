// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod listing;
mod page;
mod seen;

// Re-export all public types
pub use config::{CaptureConfig, Config, FetcherConfig, NotifyConfig, StorageConfig};
pub use listing::{Listing, NotificationEvent};
pub use page::{PageBundle, PageMetadata};
pub use seen::SeenSet;
