//! Feed synchronization engine.
//!
//! - [`reconcile`] diffs a fetched document against stored articles
//! - [`FeedSyncEngine`] registers feeds, refreshes one feed, or runs a
//!   sequential batch over all feeds with progress and cancellation
//! - [`SyncError`] and the result types form the vocabulary returned to callers

mod engine;
mod error;
mod progress;
mod reconcile;
mod result;

pub use engine::FeedSyncEngine;
pub use error::SyncError;
pub use progress::{ProgressReporter, SilentReporter, SyncProgress};
pub use reconcile::{reconcile, Reconciliation};
pub use result::{AddedFeed, BatchSummary, BatchUpdateOutcome, FeedUpdateFailure, FeedUpdateResult};
