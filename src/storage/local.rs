//! Local filesystem storage implementation.
//!
//! The storage root is the repository checkout, so the scheduler can commit
//! whatever changed after a run.
//!
//! ## Write Guarantees
//!
//! - **Snapshot**: written to a per-process temp file, synced, then renamed
//!   over the previous snapshot
//! - **Archive**: one `write_all` per JSON line on a file opened for append
//! - **Pages**: assembled in a temp directory, then renamed into place

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Listing, PageBundle, SeenSet, StorageConfig};
use crate::storage::{ArchiveStorage, SeenStore};

const PARTITION_EXT: &str = "jsonl";
const PAGES_DIR: &str = "pages";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    seen_file: String,
    archive_dir: String,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_config(root_dir, &StorageConfig::default())
    }

    /// Create a LocalStorage with custom file locations.
    pub fn with_config(root_dir: impl Into<PathBuf>, config: &StorageConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            seen_file: config.seen_file.clone(),
            archive_dir: config.archive_dir.clone(),
        }
    }

    /// Full path of the seen snapshot.
    pub fn seen_path(&self) -> PathBuf {
        self.root_dir.join(&self.seen_file)
    }

    /// Full path of the archive directory.
    pub fn archive_path(&self) -> PathBuf {
        self.root_dir.join(&self.archive_dir)
    }

    fn partition_path(&self, partition: &str) -> PathBuf {
        self.archive_path()
            .join(format!("{partition}.{PARTITION_EXT}"))
    }

    fn page_dir(&self, listing_id: &str) -> PathBuf {
        self.archive_path().join(PAGES_DIR).join(listing_id)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{}.{}.tmp", file_name, std::process::id()));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Parse JSON lines, skipping lines that do not decode (a torn tail).
    fn parse_records(path: &Path, bytes: &[u8]) -> Vec<Listing> {
        let text = String::from_utf8_lossy(bytes);
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("Skipping unreadable record in {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Ids archived in every partition except `skip`.
    async fn archived_ids_except(&self, skip: &str) -> Result<HashSet<String>> {
        let mut ids = HashSet::new();
        for partition in self.partitions().await? {
            if partition == skip {
                continue;
            }
            ids.extend(
                self.load_partition(&partition)
                    .await?
                    .into_iter()
                    .map(|record| record.id),
            );
        }
        Ok(ids)
    }

    async fn append_inner(
        &self,
        path: &Path,
        records: &[Listing],
        mut ids: HashSet<String>,
    ) -> Result<usize> {
        let existing = Self::read_bytes(path).await?.unwrap_or_default();
        ids.extend(
            Self::parse_records(path, &existing)
                .into_iter()
                .map(|record| record.id),
        );

        let mut lines = Vec::new();
        for record in records {
            if !ids.insert(record.id.clone()) {
                log::debug!("{} already archived, not adding to {}", record.id, path.display());
                continue;
            }
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            lines.push(line);
        }
        if lines.is_empty() {
            return Ok(0);
        }

        Self::ensure_dir(path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        // Terminate a torn last line so it cannot swallow the next record
        if !existing.is_empty() && !existing.ends_with(b"\n") {
            file.write_all(b"\n").await?;
        }
        for line in &lines {
            file.write_all(line).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(lines.len())
    }

    async fn store_page_inner(&self, bundle: &PageBundle) -> Result<bool> {
        let id = bundle.listing_id();
        let dir = self.page_dir(id);
        if tokio::fs::try_exists(&dir).await? {
            return Ok(false);
        }

        let tmp = self
            .archive_path()
            .join(PAGES_DIR)
            .join(format!(".{}.{}.tmp", id, std::process::id()));
        if tokio::fs::try_exists(&tmp).await? {
            tokio::fs::remove_dir_all(&tmp).await?;
        }
        tokio::fs::create_dir_all(&tmp).await?;

        tokio::fs::write(tmp.join("page.html"), bundle.html.as_bytes()).await?;
        for (i, image) in bundle.images.iter().enumerate() {
            tokio::fs::write(tmp.join(format!("image_{}.jpg", i + 1)), image).await?;
        }
        let metadata = serde_json::to_vec_pretty(&bundle.metadata)?;
        tokio::fs::write(tmp.join("metadata.json"), metadata).await?;

        if let Err(e) = tokio::fs::rename(&tmp, &dir).await {
            let _ = tokio::fs::remove_dir_all(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(true)
    }
}

/// Keys become file names; keep them to a safe alphabet.
fn check_key(kind: &str, key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(AppError::store(kind, format!("invalid key '{key}'")))
    }
}

#[async_trait]
impl SeenStore for LocalStorage {
    async fn load_seen(&self) -> Result<SeenSet> {
        let path = self.seen_path();
        let context = path.display().to_string();
        match Self::read_bytes(&path)
            .await
            .map_err(|e| AppError::store(&context, e))?
        {
            Some(bytes) => {
                SeenSet::from_snapshot(&bytes).map_err(|e| AppError::store(&context, e))
            }
            None => {
                log::info!("No snapshot at {}. Starting with an empty set.", context);
                Ok(SeenSet::new())
            }
        }
    }

    async fn persist_seen(&self, seen: &SeenSet) -> Result<()> {
        let path = self.seen_path();
        let bytes = seen.snapshot()?;
        Self::write_bytes(&path, &bytes)
            .await
            .map_err(|e| AppError::store(path.display().to_string(), e))?;
        log::info!("Snapshot: {} ids written to {}", seen.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl ArchiveStorage for LocalStorage {
    async fn append_records(&self, partition: &str, records: &[Listing]) -> Result<usize> {
        check_key("archive partition", partition)?;
        let path = self.partition_path(partition);
        let archived = self.archived_ids_except(partition).await?;
        let written = self
            .append_inner(&path, records, archived)
            .await
            .map_err(|e| AppError::store(path.display().to_string(), e))?;
        if written > 0 {
            log::info!("Archive: {} record(s) appended to {}", written, path.display());
        }
        Ok(written)
    }

    async fn load_partition(&self, partition: &str) -> Result<Vec<Listing>> {
        check_key("archive partition", partition)?;
        let path = self.partition_path(partition);
        let bytes = Self::read_bytes(&path)
            .await
            .map_err(|e| AppError::store(path.display().to_string(), e))?;
        Ok(bytes
            .map(|b| Self::parse_records(&path, &b))
            .unwrap_or_default())
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        let dir = self.archive_path();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::store(dir.display().to_string(), e)),
        };

        let mut partitions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::store(dir.display().to_string(), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PARTITION_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                partitions.push(stem.to_string());
            }
        }
        partitions.sort();
        Ok(partitions)
    }

    async fn store_page(&self, bundle: &PageBundle) -> Result<bool> {
        check_key("page", bundle.listing_id())?;
        let stored = self
            .store_page_inner(bundle)
            .await
            .map_err(|e| AppError::store(format!("page {}", bundle.listing_id()), e))?;
        if stored {
            log::info!(
                "Archived page for {} ({} images)",
                bundle.listing_id(),
                bundle.images.len()
            );
        }
        Ok(stored)
    }

    async fn has_page(&self, listing_id: &str) -> Result<bool> {
        check_key("page", listing_id)?;
        let dir = self.page_dir(listing_id);
        tokio::fs::try_exists(&dir)
            .await
            .map_err(|e| AppError::store(dir.display().to_string(), e))
    }
}
