//! Pipeline entry points for watcher operations.
//!
//! - `diff`: Pick out listings not seen before
//! - `Archiver`: Stage and flush archive records for one run
//! - `Coordinator`: Run fetch, diff, notify and persist as one invocation

pub mod archive;
pub mod diff;
pub mod run;

pub use archive::Archiver;
pub use diff::diff;
pub use run::{Coordinator, FailureSummary, RunFailure, RunReport, RunState};
