// src/pipeline/run.rs

//! Run coordinator.
//!
//! One invocation walks `INIT → FETCHING → DIFFING → NOTIFYING → PERSISTING
//! → DONE`. Any unrecoverable error ends the run in `FAILED` before the seen
//! snapshot is touched, so the next scheduled run starts from the same state.
//!
//! PERSISTING writes in this order: captured pages, archive records, seen
//! snapshot. A failure at the snapshot step leaves pages and archive records
//! of that run on disk. The retry detects the same listings again, and the
//! storage skips ids it already holds, so neither is written twice.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::Environment;
use crate::error::{AppError, Result};
use crate::models::{Config, Listing};
use crate::services::{
    ListingSource, NotificationStats, Notifier, PageCapture, SearchPageFetcher,
};
use crate::storage::{ArchiveStorage, LocalStorage, SeenStore};
use crate::utils::http;

use super::archive::Archiver;
use super::diff::diff;

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Init,
    Fetching,
    Diffing,
    Notifying,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Fetching => "FETCHING",
            Self::Diffing => "DIFFING",
            Self::Notifying => "NOTIFYING",
            Self::Persisting => "PERSISTING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A run that ended in `FAILED`. `state` is the step that was running.
#[derive(Error, Debug)]
#[error("run failed during {state}: {error}")]
pub struct RunFailure {
    /// State the run was in when the error occurred
    pub state: RunState,
    #[source]
    pub error: AppError,
}

impl RunFailure {
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }

    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            state: RunState::Failed,
            failed_during: self.state,
            retryable: self.is_retryable(),
            error: self.error.to_string(),
        }
    }
}

/// Serializable outcome of a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub state: RunState,
    pub failed_during: RunState,
    pub retryable: bool,
    pub error: String,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Listings on the search page
    pub fetched: usize,
    /// Identifiers detected for the first time, in fetch order
    pub new_listings: Vec<String>,
    pub notifications: NotificationStats,
    pub pages_captured: usize,
    pub seen_total: usize,
    pub seen_changed: bool,
    pub archive_changed: bool,
}

impl RunReport {
    /// Whether any durable file was modified.
    pub fn changed(&self) -> bool {
        self.seen_changed || self.archive_changed || self.pages_captured > 0
    }
}

/// Sequences fetch, diff, notify, archive and persist for one invocation.
pub struct Coordinator {
    source: Box<dyn ListingSource>,
    seen_store: Box<dyn SeenStore>,
    archive: Box<dyn ArchiveStorage>,
    notifier: Notifier,
    capture: Option<PageCapture>,
}

impl Coordinator {
    pub fn new(
        source: Box<dyn ListingSource>,
        seen_store: Box<dyn SeenStore>,
        archive: Box<dyn ArchiveStorage>,
        notifier: Notifier,
    ) -> Self {
        Self {
            source,
            seen_store,
            archive,
            notifier,
            capture: None,
        }
    }

    pub fn with_capture(mut self, capture: PageCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Wire the production components: HTTP fetcher, local storage under
    /// `storage_root`, and channels for whichever credentials are present.
    pub fn from_settings(config: &Config, env: &Environment, storage_root: &Path) -> Result<Self> {
        config.validate()?;

        let client = http::create_async_client(&config.fetcher)?;
        let source = SearchPageFetcher::new(client.clone(), env.search_url.clone(), &config.fetcher)?;
        let storage = LocalStorage::with_config(storage_root, &config.storage);
        let notifier = Notifier::from_environment(&config.notify, env, client.clone());

        let coordinator = Self::new(
            Box::new(source),
            Box::new(storage.clone()),
            Box::new(storage),
            notifier,
        );
        if config.capture.enabled {
            Ok(coordinator.with_capture(PageCapture::new(client, &config.capture)?))
        } else {
            Ok(coordinator)
        }
    }

    /// Execute one run.
    pub async fn run(&self) -> std::result::Result<RunReport, RunFailure> {
        let started_at = Utc::now();
        let mut state = RunState::Init;
        let fail = |state: RunState| {
            move |error: AppError| {
                transition(state, RunState::Failed);
                RunFailure { state, error }
            }
        };

        let mut seen = self.seen_store.load_seen().await.map_err(fail(state))?;
        log::info!("Loaded {} seen listing id(s)", seen.len());

        state = transition(state, RunState::Fetching);
        let candidates = self.source.fetch().await.map_err(fail(state))?;

        state = transition(state, RunState::Diffing);
        let new_listings = diff(&candidates, &seen);
        if new_listings.is_empty() {
            log::info!("No new listings");
        } else {
            log::info!("{} new listing(s)", new_listings.len());
        }

        state = transition(state, RunState::Notifying);
        let mut archiver = Archiver::new();
        let mut notifications = NotificationStats::default();
        for listing in &new_listings {
            let result = self.notifier.notify(listing).await;
            notifications.record(&result);
            archiver.append(&listing.partition_key(), listing);
            seen.insert(listing.id.clone());
        }

        state = transition(state, RunState::Persisting);
        let pages_captured = self.capture_pages(&new_listings).await;
        let archive_changed = archiver
            .flush(self.archive.as_ref())
            .await
            .map_err(fail(state))?;
        let seen_changed = seen.is_changed();
        if seen_changed {
            self.seen_store
                .persist_seen(&seen)
                .await
                .map_err(fail(state))?;
        }

        state = transition(state, RunState::Done);
        Ok(RunReport {
            state,
            started_at,
            finished_at: Utc::now(),
            fetched: candidates.len(),
            new_listings: new_listings.into_iter().map(|l| l.id).collect(),
            notifications,
            pages_captured,
            seen_total: seen.len(),
            seen_changed,
            archive_changed,
        })
    }

    /// Best-effort page capture; failures are logged and skipped.
    async fn capture_pages(&self, listings: &[Listing]) -> usize {
        let Some(capture) = &self.capture else {
            return 0;
        };

        let mut captured = 0;
        for listing in listings {
            match self.archive.has_page(&listing.id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Skipping page capture for {}: {}", listing.id, e);
                    continue;
                }
            }

            let bundle = match capture.capture(listing).await {
                Ok(bundle) => bundle,
                Err(e) => {
                    log::warn!("Page capture failed for {}: {}", listing.id, e);
                    continue;
                }
            };
            match self.archive.store_page(&bundle).await {
                Ok(true) => captured += 1,
                Ok(false) => {}
                Err(e) => log::warn!("Storing page for {} failed: {}", listing.id, e),
            }
        }
        captured
    }
}

fn transition(from: RunState, to: RunState) -> RunState {
    log::debug!("Run state: {} -> {}", from, to);
    to
}
