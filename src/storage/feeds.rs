use std::collections::HashMap;

use super::articles::{insert_articles_in, update_articles_in};
use super::schema::Database;
use super::types::{
    is_unique_violation, ArticleUpdate, DatabaseError, ExistingArticle, Feed, FeedArticleCounts,
    NewArticle,
};

impl Database {
    // ========================================================================
    // Feed Queries
    // ========================================================================

    /// Look up a feed by its database ID
    pub async fn find_feed_by_id(&self, feed_id: i64) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, description, error, last_updated_at, created_at
            FROM feeds
            WHERE id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Look up a feed by its exact subscription URL
    pub async fn find_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, description, error, last_updated_at, created_at
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// All feeds in registration order (ascending id)
    pub async fn list_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, url, title, description, error, last_updated_at, created_at
            FROM feeds
            ORDER BY id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Total and unread article counts per feed, in registration order
    pub async fn feed_article_counts(&self) -> Result<Vec<FeedArticleCounts>, DatabaseError> {
        let counts = sqlx::query_as::<_, FeedArticleCounts>(
            r#"
            SELECT
                f.id AS feed_id,
                COUNT(a.id) AS total,
                COUNT(CASE WHEN a.is_read = 0 THEN 1 END) AS unread
            FROM feeds f
            LEFT JOIN articles a ON f.id = a.feed_id
            GROUP BY f.id
            ORDER BY f.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    /// Stored articles of a feed keyed by URL, carrying only the fields
    /// synchronization compares.
    pub async fn existing_articles_for_feed(
        &self,
        feed_id: i64,
    ) -> Result<HashMap<String, ExistingArticle>, DatabaseError> {
        let rows = sqlx::query_as::<_, ExistingArticle>(
            r#"
            SELECT id, url, title, content, summary, published_at
            FROM articles
            WHERE feed_id = ?
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| (row.url.clone(), row)).collect())
    }

    // ========================================================================
    // Feed Mutations
    // ========================================================================

    /// Insert a feed row without any articles.
    ///
    /// `last_updated_at` stays unset until the first successful refresh.
    pub async fn create_feed(
        &self,
        url: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Feed, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (url, title, description, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, url, title, description, error, last_updated_at, created_at
        "#,
        )
        .bind(url)
        .bind(title)
        .bind(description)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| duplicate_or_other(e, url))?;
        Ok(feed)
    }

    /// Register a feed together with its first batch of articles in one transaction.
    ///
    /// Either the feed row and every article are committed, or nothing is.
    ///
    /// # Returns
    ///
    /// The created feed and the number of articles inserted.
    ///
    /// # Errors
    ///
    /// `DatabaseError::DuplicateUrl` if the URL is already subscribed.
    pub async fn create_feed_with_articles(
        &self,
        url: &str,
        title: &str,
        description: Option<&str>,
        articles: &[NewArticle],
    ) -> Result<(Feed, usize), DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let feed = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (url, title, description, last_updated_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, url, title, description, error, last_updated_at, created_at
        "#,
        )
        .bind(url)
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| duplicate_or_other(e, url))?;

        let inserted = insert_articles_in(&mut *tx, feed.id, articles, now).await?;

        tx.commit().await?;
        Ok((feed, inserted))
    }

    /// Apply one feed's refresh atomically: refresh the feed's
    /// title/description, clear its error and bump `last_updated_at`, then
    /// insert new articles and rewrite changed ones.
    ///
    /// A `None` title keeps the stored title.
    ///
    /// # Returns
    ///
    /// The number of article rows actually inserted, or `None` (with nothing
    /// written) when the feed no longer exists.
    pub async fn apply_feed_refresh(
        &self,
        feed_id: i64,
        title: Option<&str>,
        description: Option<&str>,
        inserts: &[NewArticle],
        updates: &[ArticleUpdate],
    ) -> Result<Option<usize>, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query(
            r#"
            UPDATE feeds
            SET title = COALESCE(?, title),
                description = ?,
                last_updated_at = ?,
                error = NULL
            WHERE id = ?
        "#,
        )
        .bind(title)
        .bind(description)
        .bind(now)
        .bind(feed_id)
        .execute(&mut *tx)
        .await?;

        if touched.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = insert_articles_in(&mut *tx, feed_id, inserts, now).await?;
        update_articles_in(&mut *tx, feed_id, updates, now).await?;

        tx.commit().await?;
        Ok(Some(inserted))
    }

    /// Refresh a feed's metadata without touching its articles
    pub async fn upsert_feed_metadata(
        &self,
        feed_id: i64,
        title: Option<&str>,
        description: Option<&str>,
        last_updated_at: i64,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET title = COALESCE(?, title),
                description = ?,
                last_updated_at = ?
            WHERE id = ?
        "#,
        )
        .bind(title)
        .bind(description)
        .bind(last_updated_at)
        .bind(feed_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the error message shown for a feed
    pub async fn set_feed_error(
        &self,
        feed_id: i64,
        error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE feeds SET error = ? WHERE id = ?")
            .bind(error)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a feed and, by cascade, its articles and their pins.
    ///
    /// Returns the number of articles removed. Deleting an unknown feed is a no-op.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(count.max(0) as u64)
    }
}

fn duplicate_or_other(err: sqlx::Error, url: &str) -> DatabaseError {
    if is_unique_violation(&err) {
        DatabaseError::DuplicateUrl(url.to_string())
    } else {
        DatabaseError::Other(err)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{ArticleUpdate, Database, DatabaseError, NewArticle};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn test_article(slug: &str, title: &str) -> NewArticle {
        NewArticle {
            url: format!("https://example.com/{}", slug),
            title: title.to_string(),
            content: None,
            summary: Some("Test summary".to_string()),
            author: None,
            published_at: Some(1704067200),
            thumbnail_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_feed() {
        let db = test_db().await;
        let feed = db
            .create_feed("https://example.com/rss", "Example", Some("About"))
            .await
            .unwrap();

        assert!(feed.id > 0);
        assert_eq!(feed.last_updated_at, None);

        let by_id = db.find_feed_by_id(feed.id).await.unwrap().unwrap();
        let by_url = db
            .find_feed_by_url("https://example.com/rss")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id, feed);
        assert_eq!(by_url, feed);
        assert_eq!(by_id.description.as_deref(), Some("About"));
    }

    #[tokio::test]
    async fn test_find_unknown_feed() {
        let db = test_db().await;
        assert!(db.find_feed_by_id(42).await.unwrap().is_none());
        assert!(db.find_feed_by_url("https://nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_feed_duplicate_url() {
        let db = test_db().await;
        db.create_feed("https://example.com/rss", "A", None)
            .await
            .unwrap();

        let err = db
            .create_feed("https://example.com/rss", "B", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateUrl(url) if url == "https://example.com/rss"));
    }

    #[tokio::test]
    async fn test_list_feeds_registration_order() {
        let db = test_db().await;
        // Titles deliberately out of alphabetical order
        db.create_feed("https://c.example.com/rss", "Charlie", None)
            .await
            .unwrap();
        db.create_feed("https://a.example.com/rss", "Alpha", None)
            .await
            .unwrap();
        db.create_feed("https://b.example.com/rss", "Bravo", None)
            .await
            .unwrap();

        let titles: Vec<_> = db
            .list_feeds()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["Charlie", "Alpha", "Bravo"]);
    }

    #[tokio::test]
    async fn test_create_feed_with_articles() {
        let db = test_db().await;
        let (feed, inserted) = db
            .create_feed_with_articles(
                "https://example.com/rss",
                "Example",
                None,
                &[test_article("1", "One"), test_article("2", "Two")],
            )
            .await
            .unwrap();

        assert_eq!(inserted, 2);
        assert!(feed.last_updated_at.is_some());

        let articles = db.articles_for_feed(feed.id, None).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert!(articles.iter().all(|a| !a.is_read && !a.is_favorite));
    }

    #[tokio::test]
    async fn test_create_feed_with_articles_duplicate_leaves_no_articles() {
        let db = test_db().await;
        let existing = db
            .create_feed("https://example.com/rss", "Example", None)
            .await
            .unwrap();

        let err = db
            .create_feed_with_articles(
                "https://example.com/rss",
                "Again",
                None,
                &[test_article("1", "One")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateUrl(_)));

        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
        assert!(db
            .articles_for_feed(existing.id, None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_existing_articles_keyed_by_url() {
        let db = test_db().await;
        let (feed, _) = db
            .create_feed_with_articles(
                "https://example.com/rss",
                "Example",
                None,
                &[test_article("a", "A"), test_article("b", "B")],
            )
            .await
            .unwrap();

        let existing = db.existing_articles_for_feed(feed.id).await.unwrap();
        assert_eq!(existing.len(), 2);
        assert_eq!(existing["https://example.com/a"].title, "A");
        assert_eq!(existing["https://example.com/b"].title, "B");
    }

    #[tokio::test]
    async fn test_apply_feed_refresh_inserts_updates_and_bumps_metadata() {
        let db = test_db().await;
        let feed = db
            .create_feed("https://example.com/rss", "Old", None)
            .await
            .unwrap();
        db.set_feed_error(feed.id, Some("Previous error"))
            .await
            .unwrap();
        db.insert_articles(feed.id, &[test_article("a", "Original")])
            .await
            .unwrap();

        let existing = db.existing_articles_for_feed(feed.id).await.unwrap();
        let update = ArticleUpdate {
            id: existing["https://example.com/a"].id,
            title: "Changed".to_string(),
            content: Some("Body".to_string()),
            summary: None,
            published_at: Some(1704153600),
        };

        let inserted = db
            .apply_feed_refresh(
                feed.id,
                Some("New"),
                Some("Desc"),
                &[test_article("b", "B")],
                &[update],
            )
            .await
            .unwrap();
        assert_eq!(inserted, Some(1));

        let refreshed = db.find_feed_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(refreshed.title, "New");
        assert_eq!(refreshed.description.as_deref(), Some("Desc"));
        assert!(refreshed.error.is_none(), "error should be cleared");
        assert!(refreshed.last_updated_at.is_some());

        let articles = db.articles_for_feed(feed.id, None).await.unwrap();
        assert_eq!(articles.len(), 2);
        let changed = articles
            .iter()
            .find(|a| a.url == "https://example.com/a")
            .unwrap();
        assert_eq!(changed.title, "Changed");
        assert_eq!(changed.content.as_deref(), Some("Body"));
        assert_eq!(changed.summary, None);
    }

    #[tokio::test]
    async fn test_apply_feed_refresh_none_title_keeps_stored() {
        let db = test_db().await;
        let feed = db
            .create_feed("https://example.com/rss", "Keep Me", None)
            .await
            .unwrap();

        db.apply_feed_refresh(feed.id, None, None, &[], &[])
            .await
            .unwrap();

        let refreshed = db.find_feed_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(refreshed.title, "Keep Me");
        assert!(refreshed.last_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_apply_feed_refresh_missing_feed_writes_nothing() {
        let db = test_db().await;
        let feed = db
            .create_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();

        for inserts in [vec![], vec![test_article("a", "A")]] {
            let applied = db
                .apply_feed_refresh(feed.id + 100, Some("X"), None, &inserts, &[])
                .await
                .unwrap();
            assert_eq!(applied, None);
        }

        let untouched = db.find_feed_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(untouched.last_updated_at, None);
        let counts = db.feed_article_counts().await.unwrap();
        assert_eq!(counts[0].total, 0);
    }

    #[tokio::test]
    async fn test_upsert_feed_metadata() {
        let db = test_db().await;
        let feed = db
            .create_feed("https://example.com/rss", "Feed", None)
            .await
            .unwrap();

        let changed = db
            .upsert_feed_metadata(feed.id, Some("Renamed"), Some("Desc"), 1700000000)
            .await
            .unwrap();
        assert!(changed);

        let feed = db.find_feed_by_id(feed.id).await.unwrap().unwrap();
        assert_eq!(feed.title, "Renamed");
        assert_eq!(feed.last_updated_at, Some(1700000000));

        assert!(!db
            .upsert_feed_metadata(9999, None, None, 1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_feed_article_counts() {
        let db = test_db().await;
        let (a, _) = db
            .create_feed_with_articles(
                "https://a.example.com/rss",
                "A",
                None,
                &[test_article("1", "1"), test_article("2", "2")],
            )
            .await
            .unwrap();
        let b = db
            .create_feed("https://b.example.com/rss", "B", None)
            .await
            .unwrap();

        let first = db.articles_for_feed(a.id, None).await.unwrap();
        db.mark_article_read(first[0].id).await.unwrap();

        let counts = db.feed_article_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!((counts[0].feed_id, counts[0].total, counts[0].unread), (a.id, 2, 1));
        assert_eq!((counts[1].feed_id, counts[1].total, counts[1].unread), (b.id, 0, 0));
    }

    #[tokio::test]
    async fn test_delete_feed_cascades() {
        let db = test_db().await;
        let (feed, _) = db
            .create_feed_with_articles(
                "https://example.com/rss",
                "Feed",
                None,
                &[test_article("1", "1"), test_article("2", "2"), test_article("3", "3")],
            )
            .await
            .unwrap();
        let articles = db.articles_for_feed(feed.id, None).await.unwrap();
        db.pin_article(articles[0].id).await.unwrap();

        let removed = db.delete_feed(feed.id).await.unwrap();
        assert_eq!(removed, 3);

        assert!(db.list_feeds().await.unwrap().is_empty());
        assert!(db.articles_for_feed(feed.id, None).await.unwrap().is_empty());
        assert!(db.pinned_articles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_feed_is_idempotent() {
        let db = test_db().await;
        assert_eq!(db.delete_feed(99999).await.unwrap(), 0);
    }
}
