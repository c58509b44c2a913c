//! Storage abstractions for watcher state.
//!
//! Two kinds of durable state survive between runs:
//! - The seen snapshot: every listing id ever processed, rewritten atomically
//! - The archive: append-only JSON lines, one file per UTC day, plus
//!   captured listing pages
//!
//! ## Directory Structure
//!
//! ```text
//! {root}/
//! ├── config.toml                 # Optional settings
//! ├── seen_listings.json          # ["1000001", "2000002", ...]
//! └── archives/
//!     ├── 2024-01-15.jsonl        # One Listing per line
//!     ├── 2024-01-16.jsonl
//!     └── pages/
//!         └── 1000001/
//!             ├── page.html
//!             ├── image_1.jpg
//!             └── metadata.json
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Listing, PageBundle, SeenSet};

// Re-export for convenience
pub use local::LocalStorage;

/// Persistence for the seen snapshot.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Load the snapshot. A missing snapshot is an empty set.
    async fn load_seen(&self) -> Result<SeenSet>;

    /// Replace the snapshot. Either the whole new set is written or the
    /// previous snapshot is left untouched.
    async fn persist_seen(&self, seen: &SeenSet) -> Result<()>;
}

/// Append-only archive of detected listings.
#[async_trait]
pub trait ArchiveStorage: Send + Sync {
    /// Append records to a partition, skipping ids already held by any
    /// partition. Returns the number of records written.
    async fn append_records(&self, partition: &str, records: &[Listing]) -> Result<usize>;

    /// Read every record of a partition.
    async fn load_partition(&self, partition: &str) -> Result<Vec<Listing>>;

    /// Partition keys present in the archive, sorted.
    async fn partitions(&self) -> Result<Vec<String>>;

    /// Store a captured page. Returns `false` if one was already stored.
    async fn store_page(&self, bundle: &PageBundle) -> Result<bool>;

    async fn has_page(&self, listing_id: &str) -> Result<bool>;
}
