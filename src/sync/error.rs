use thiserror::Error;

use crate::feed::FetchError;
use crate::storage::DatabaseError;
use crate::util::UrlValidationError;

/// Errors surfaced by [`FeedSyncEngine`](super::FeedSyncEngine) operations.
///
/// Each failure kind is its own variant; wrapping variants keep the
/// underlying error reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The initial fetch of a feed being registered failed.
    /// Match on the inner error to tell transport and parse failures apart.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Feed {0} is already subscribed")]
    DuplicateFeed(String),

    #[error("Feed {0} not found")]
    FeedNotFound(i64),

    /// Refreshing a known feed failed while fetching or parsing it
    #[error("Failed to update feed {feed_id} ({feed_url}): {source}")]
    FeedUpdate {
        feed_id: i64,
        feed_url: String,
        #[source]
        source: FetchError,
    },

    /// Storage failed while reading or writing feed state
    #[error("{}", management_message(*feed_id, source))]
    FeedManagement {
        feed_id: Option<i64>,
        #[source]
        source: DatabaseError,
    },

    #[error("Invalid feed URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: UrlValidationError,
    },
}

impl SyncError {
    /// Feed the error is attributable to, when one is known
    pub fn feed_id(&self) -> Option<i64> {
        match self {
            SyncError::FeedNotFound(id) => Some(*id),
            SyncError::FeedUpdate { feed_id, .. } => Some(*feed_id),
            SyncError::FeedManagement { feed_id, .. } => *feed_id,
            SyncError::Fetch(_) | SyncError::DuplicateFeed(_) | SyncError::InvalidUrl { .. } => {
                None
            }
        }
    }

    pub(crate) fn management(feed_id: Option<i64>, source: DatabaseError) -> Self {
        SyncError::FeedManagement { feed_id, source }
    }
}

fn management_message(feed_id: Option<i64>, source: &DatabaseError) -> String {
    match feed_id {
        Some(id) => format!("Storage failure for feed {}: {}", id, source),
        None => format!("Storage failure: {}", source),
    }
}
