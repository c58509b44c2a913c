//! Set of listing identifiers already processed.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::Result;

/// Durable set of previously processed listing identifiers.
///
/// Only grows. `is_changed` reports whether anything was inserted since the
/// set was loaded, so callers can skip rewriting an unchanged snapshot.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    ids: BTreeSet<String>,
    changed: bool,
}

/// Accepted on-disk shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    List(Vec<String>),
    Wrapped { seen: Vec<String> },
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Insert an identifier. Returns `true` if it was not present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let inserted = self.ids.insert(id.into());
        self.changed |= inserted;
        inserted
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Serialize to the snapshot format: a sorted JSON array of identifiers.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let ids: Vec<&str> = self.iter().collect();
        Ok(serde_json::to_vec(&ids)?)
    }

    /// Parse a snapshot. The result is not marked as changed.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let parsed: SnapshotFile = serde_json::from_slice(bytes)?;
        let ids = match parsed {
            SnapshotFile::List(ids) | SnapshotFile::Wrapped { seen: ids } => ids,
        };
        Ok(Self {
            ids: ids.into_iter().collect(),
            changed: false,
        })
    }
}

impl PartialEq for SeenSet {
    fn eq(&self, other: &Self) -> bool {
        self.ids == other.ids
    }
}

impl Eq for SeenSet {}

impl<S: Into<String>> FromIterator<S> for SeenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
            changed: false,
        }
    }
}
