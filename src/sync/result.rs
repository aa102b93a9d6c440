use serde::{Serialize, Serializer};

use super::error::SyncError;
use crate::storage::Feed;

/// Counts produced by one successful feed refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedUpdateResult {
    pub feed_id: i64,
    pub new_articles_count: usize,
    pub updated_articles_count: usize,
    /// Distinct identifiable items in the fetched document
    pub total_articles_count: usize,
}

/// A feed that failed during a batch run
#[derive(Debug, Serialize)]
pub struct FeedUpdateFailure {
    pub feed_id: i64,
    pub feed_url: String,
    #[serde(serialize_with = "as_display")]
    pub error: SyncError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BatchSummary {
    pub total_feeds: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Result of a batch run: either a full accounting or an early stop.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchUpdateOutcome {
    /// Stopped at a feed boundary; feeds after `processed_feeds` were never attempted
    Cancelled {
        processed_feeds: usize,
        total_feeds: usize,
    },
    Completed {
        summary: BatchSummary,
        successful: Vec<FeedUpdateResult>,
        failed: Vec<FeedUpdateFailure>,
    },
}

impl BatchUpdateOutcome {
    pub(crate) fn completed(
        successful: Vec<FeedUpdateResult>,
        failed: Vec<FeedUpdateFailure>,
    ) -> Self {
        BatchUpdateOutcome::Completed {
            summary: BatchSummary {
                total_feeds: successful.len() + failed.len(),
                success_count: successful.len(),
                failure_count: failed.len(),
            },
            successful,
            failed,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BatchUpdateOutcome::Cancelled { .. })
    }
}

/// A newly registered feed and the number of articles it was seeded with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedFeed {
    pub feed: Feed,
    pub articles_count: usize,
}

fn as_display<S: Serializer>(error: &SyncError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_completed_summary_counts() {
        let outcome = BatchUpdateOutcome::completed(
            vec![FeedUpdateResult {
                feed_id: 1,
                new_articles_count: 2,
                updated_articles_count: 0,
                total_articles_count: 2,
            }],
            vec![FeedUpdateFailure {
                feed_id: 2,
                feed_url: "https://b.example/rss".to_string(),
                error: SyncError::FeedNotFound(2),
            }],
        );

        match &outcome {
            BatchUpdateOutcome::Completed { summary, .. } => assert_eq!(
                *summary,
                BatchSummary {
                    total_feeds: 2,
                    success_count: 1,
                    failure_count: 1,
                }
            ),
            other => panic!("Expected Completed, got {:?}", other),
        }
        assert!(!outcome.is_cancelled());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = BatchUpdateOutcome::completed(
            vec![],
            vec![FeedUpdateFailure {
                feed_id: 3,
                feed_url: "https://c.example/rss".to_string(),
                error: SyncError::FeedNotFound(3),
            }],
        );

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "completed",
                "summary": {"total_feeds": 1, "success_count": 0, "failure_count": 1},
                "successful": [],
                "failed": [{
                    "feed_id": 3,
                    "feed_url": "https://c.example/rss",
                    "error": "Feed 3 not found"
                }]
            })
        );

        let cancelled = BatchUpdateOutcome::Cancelled {
            processed_feeds: 1,
            total_feeds: 4,
        };
        assert_eq!(
            serde_json::to_value(&cancelled).unwrap(),
            json!({"status": "cancelled", "processed_feeds": 1, "total_feeds": 4})
        );
    }
}
