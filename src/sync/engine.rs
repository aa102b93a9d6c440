use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use super::error::SyncError;
use super::progress::{ProgressReporter, SilentReporter, SyncProgress};
use super::reconcile::reconcile;
use super::result::{AddedFeed, BatchUpdateOutcome, FeedUpdateFailure, FeedUpdateResult};
use crate::feed::{FeedSource, FetchError};
use crate::storage::{Database, DatabaseError};
use crate::util::validate_feed_url;

/// Registers feeds and keeps their articles in sync with upstream.
///
/// Generic over the [`FeedSource`] so tests can substitute scripted documents
/// for the network.
#[derive(Debug, Clone)]
pub struct FeedSyncEngine<S> {
    db: Database,
    source: S,
}

impl<S: FeedSource> FeedSyncEngine<S> {
    pub fn new(db: Database, source: S) -> Self {
        Self { db, source }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Subscribe to a feed and seed it with every item of its first fetch.
    ///
    /// Registration is all-or-nothing: when the URL is invalid, already
    /// subscribed, or the fetch fails, nothing is written.
    ///
    /// # Errors
    ///
    /// - `SyncError::InvalidUrl` if `url` is not an absolute http(s) URL
    /// - `SyncError::DuplicateFeed` if the exact URL is already subscribed
    /// - `SyncError::Fetch` if the initial fetch or parse fails
    /// - `SyncError::FeedManagement` on storage failures
    pub async fn add_feed(&self, url: &str) -> Result<AddedFeed, SyncError> {
        let url = validate_feed_url(url).map_err(|source| SyncError::InvalidUrl {
            url: url.trim().to_string(),
            source,
        })?;

        let existing = self
            .db
            .find_feed_by_url(&url)
            .await
            .map_err(|e| SyncError::management(None, e))?;
        if existing.is_some() {
            return Err(SyncError::DuplicateFeed(url));
        }

        let document = self.source.fetch(&url).await?;
        let plan = reconcile(&document.items, &HashMap::new());

        let title = document
            .meta
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(url.as_str())
            .to_string();

        let (feed, articles_count) = self
            .db
            .create_feed_with_articles(
                &url,
                &title,
                document.meta.description.as_deref(),
                &plan.to_insert,
            )
            .await
            .map_err(|e| match e {
                // Lost a race with a concurrent registration of the same URL
                DatabaseError::DuplicateUrl(url) => SyncError::DuplicateFeed(url),
                other => SyncError::management(None, other),
            })?;

        tracing::info!(
            feed_id = feed.id,
            url = %feed.url,
            articles = articles_count,
            "Feed added"
        );

        Ok(AddedFeed {
            feed,
            articles_count,
        })
    }

    /// Refresh one feed: fetch, reconcile against stored articles, persist.
    ///
    /// All article writes and the feed metadata bump commit together, so
    /// running this twice without upstream changes reports zero new and
    /// zero updated articles the second time.
    ///
    /// # Errors
    ///
    /// - `SyncError::FeedNotFound` if `feed_id` is unknown (nothing is fetched)
    /// - `SyncError::FeedUpdate` if the fetch or parse fails
    /// - `SyncError::FeedManagement` on storage failures
    pub async fn update_feed(&self, feed_id: i64) -> Result<FeedUpdateResult, SyncError> {
        let feed = self
            .db
            .find_feed_by_id(feed_id)
            .await
            .map_err(|e| SyncError::management(Some(feed_id), e))?
            .ok_or(SyncError::FeedNotFound(feed_id))?;

        let document = match self.source.fetch(&feed.url).await {
            Ok(document) => document,
            Err(source) => {
                self.record_feed_error(feed.id, &source).await;
                return Err(SyncError::FeedUpdate {
                    feed_id: feed.id,
                    feed_url: feed.url,
                    source,
                });
            }
        };

        let existing = self
            .db
            .existing_articles_for_feed(feed.id)
            .await
            .map_err(|e| SyncError::management(Some(feed.id), e))?;

        let plan = reconcile(&document.items, &existing);
        tracing::debug!(
            feed_id = feed.id,
            new = plan.new_count,
            updated = plan.updated_count,
            unchanged = plan.unchanged_count,
            "Reconciled feed"
        );

        let title = document
            .meta
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        self.db
            .apply_feed_refresh(
                feed.id,
                title,
                document.meta.description.as_deref(),
                &plan.to_insert,
                &plan.to_update,
            )
            .await
            .map_err(|e| SyncError::management(Some(feed.id), e))?
            // Deleted while its fetch was in flight
            .ok_or(SyncError::FeedNotFound(feed.id))?;

        Ok(FeedUpdateResult {
            feed_id: feed.id,
            new_articles_count: plan.new_count,
            updated_articles_count: plan.updated_count,
            total_articles_count: plan.total_count,
        })
    }

    /// Refresh every feed without progress reporting or cancellation
    pub async fn update_all_feeds(&self) -> Result<BatchUpdateOutcome, SyncError> {
        self.update_all_feeds_cancellable(&SilentReporter, CancellationToken::new())
            .await
    }

    /// Refresh every feed in registration order, one at a time.
    ///
    /// Before each feed the token is checked; once cancelled the run stops and
    /// returns [`BatchUpdateOutcome::Cancelled`] with the number of feeds
    /// already attempted. A cancellation requested during a feed takes effect
    /// after that feed finishes. The reporter is called once per attempted
    /// feed, before its fetch, with a 1-based index.
    ///
    /// A failing feed is recorded in `failed` and never stops the run.
    ///
    /// # Errors
    ///
    /// Only `SyncError::FeedManagement` when the feed list cannot be read.
    pub async fn update_all_feeds_cancellable<R: ProgressReporter + ?Sized>(
        &self,
        reporter: &R,
        cancel_token: CancellationToken,
    ) -> Result<BatchUpdateOutcome, SyncError> {
        let feeds = self
            .db
            .list_feeds()
            .await
            .map_err(|e| SyncError::management(None, e))?;
        let total_feeds = feeds.len();

        tracing::info!(total = total_feeds, "Starting feed refresh");

        let mut successful = Vec::new();
        let mut failed = Vec::new();

        for (i, feed) in feeds.into_iter().enumerate() {
            if cancel_token.is_cancelled() {
                tracing::info!(
                    processed = i,
                    total = total_feeds,
                    "Feed refresh cancelled"
                );
                return Ok(BatchUpdateOutcome::Cancelled {
                    processed_feeds: i,
                    total_feeds,
                });
            }

            reporter.report(&SyncProgress {
                current_index: i + 1,
                total_feeds,
                feed_title: feed.title.clone(),
                feed_url: feed.url.clone(),
            });

            match self.update_feed(feed.id).await {
                Ok(result) => successful.push(result),
                Err(error) => {
                    tracing::warn!(
                        feed_id = feed.id,
                        url = %feed.url,
                        error = %error,
                        "Feed refresh failed"
                    );
                    failed.push(FeedUpdateFailure {
                        feed_id: feed.id,
                        feed_url: feed.url,
                        error,
                    });
                }
            }
        }

        tracing::info!(
            succeeded = successful.len(),
            failed = failed.len(),
            "Feed refresh complete"
        );

        Ok(BatchUpdateOutcome::completed(successful, failed))
    }

    /// Best-effort: a failure here must not mask the fetch error
    async fn record_feed_error(&self, feed_id: i64, error: &FetchError) {
        if let Err(e) = self
            .db
            .set_feed_error(feed_id, Some(&error.to_string()))
            .await
        {
            tracing::warn!(feed_id = feed_id, error = %e, "Failed to record feed error");
        }
    }
}
