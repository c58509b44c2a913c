// src/pipeline/archive.rs

//! Run-scoped archive staging.
//!
//! Records are collected in memory while the run notifies and written in one
//! pass when the run persists, so a run that fails early leaves the archive
//! untouched.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::Listing;
use crate::storage::ArchiveStorage;

/// Collects newly detected listings per partition until flushed.
#[derive(Debug, Default)]
pub struct Archiver {
    pending: BTreeMap<String, Vec<Listing>>,
}

impl Archiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage one record under `partition`.
    pub fn append(&mut self, partition: &str, listing: &Listing) {
        self.pending
            .entry(partition.to_string())
            .or_default()
            .push(listing.clone());
    }

    /// Number of staged records.
    pub fn pending(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn staged(&self, partition: &str) -> &[Listing] {
        self.pending.get(partition).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Write staged records. Returns whether anything reached disk.
    pub async fn flush(self, storage: &dyn ArchiveStorage) -> Result<bool> {
        let mut written = 0;
        for (partition, records) in &self.pending {
            written += storage.append_records(partition, records).await?;
        }
        Ok(written > 0)
    }
}
