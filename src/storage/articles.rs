use sqlx::{QueryBuilder, SqliteConnection};

use super::schema::Database;
use super::types::{Article, ArticleUpdate, DatabaseError, NewArticle};

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of articles to return from any single query (OOM protection)
const MAX_ARTICLES: i64 = 2000;

/// Default page size for per-feed listings
const DEFAULT_ARTICLE_LIMIT: i64 = 500;

/// 10 columns * 50 rows = 500 bind parameters, under SQLite's 999 limit
const INSERT_BATCH_SIZE: usize = 50;

// ============================================================================
// Transaction-scoped Writes
// ============================================================================

/// Insert articles for a feed on an open connection or transaction.
///
/// Rows whose `(feed_id, url)` already exists are skipped, so the returned
/// count is the number of rows actually created.
pub(crate) async fn insert_articles_in(
    conn: &mut SqliteConnection,
    feed_id: i64,
    articles: &[NewArticle],
    now: i64,
) -> Result<usize, sqlx::Error> {
    let mut inserted = 0usize;

    for chunk in articles.chunks(INSERT_BATCH_SIZE) {
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "INSERT INTO articles (feed_id, url, title, content, summary, author, \
             published_at, thumbnail_url, created_at, updated_at) ",
        );

        builder.push_values(chunk, |mut b, article| {
            b.push_bind(feed_id)
                .push_bind(&article.url)
                .push_bind(&article.title)
                .push_bind(&article.content)
                .push_bind(&article.summary)
                .push_bind(&article.author)
                .push_bind(article.published_at)
                .push_bind(&article.thumbnail_url)
                .push_bind(now)
                .push_bind(now);
        });

        builder.push(" ON CONFLICT(feed_id, url) DO NOTHING");

        let result = builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected() as usize;
    }

    Ok(inserted)
}

/// Rewrite content-bearing fields of stored articles.
///
/// Reader state (`is_read`, `is_favorite`) and `created_at` are never touched.
/// The `feed_id` guard keeps an update from landing on another feed's row.
pub(crate) async fn update_articles_in(
    conn: &mut SqliteConnection,
    feed_id: i64,
    updates: &[ArticleUpdate],
    now: i64,
) -> Result<u64, sqlx::Error> {
    let mut updated = 0u64;

    for update in updates {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET title = ?, content = ?, summary = ?, published_at = ?, updated_at = ?
            WHERE id = ? AND feed_id = ?
        "#,
        )
        .bind(&update.title)
        .bind(&update.content)
        .bind(&update.summary)
        .bind(update.published_at)
        .bind(now)
        .bind(update.id)
        .bind(feed_id)
        .execute(&mut *conn)
        .await?;
        updated += result.rows_affected();
    }

    Ok(updated)
}

impl Database {
    // ========================================================================
    // Article Writes
    // ========================================================================

    /// Insert articles for a feed in their own transaction, returns the number inserted
    pub async fn insert_articles(
        &self,
        feed_id: i64,
        articles: &[NewArticle],
    ) -> Result<usize, DatabaseError> {
        if articles.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let inserted = insert_articles_in(&mut *tx, feed_id, articles, now).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Apply content updates to a feed's articles in their own transaction,
    /// returns the number of rows changed
    pub async fn update_articles(
        &self,
        feed_id: i64,
        updates: &[ArticleUpdate],
    ) -> Result<u64, DatabaseError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;
        let updated = update_articles_in(&mut *tx, feed_id, updates, now).await?;
        tx.commit().await?;
        Ok(updated)
    }

    // ========================================================================
    // Article Queries
    // ========================================================================

    /// Articles of a feed, newest first.
    ///
    /// `limit` defaults to 500 and is capped at 2000.
    pub async fn articles_for_feed(
        &self,
        feed_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Article>, DatabaseError> {
        let limit = limit.unwrap_or(DEFAULT_ARTICLE_LIMIT).min(MAX_ARTICLES);

        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, feed_id, url, title, content, summary, author, published_at,
                   thumbnail_url, is_read, is_favorite, created_at, updated_at
            FROM articles
            WHERE feed_id = ?
            ORDER BY COALESCE(published_at, created_at) DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    /// A single article by ID
    pub async fn article_by_id(&self, article_id: i64) -> Result<Option<Article>, DatabaseError> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, feed_id, url, title, content, summary, author, published_at,
                   thumbnail_url, is_read, is_favorite, created_at, updated_at
            FROM articles
            WHERE id = ?
        "#,
        )
        .bind(article_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(article)
    }

    /// All favorite articles across feeds, newest first (capped at 2000)
    pub async fn favorite_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT id, feed_id, url, title, content, summary, author, published_at,
                   thumbnail_url, is_read, is_favorite, created_at, updated_at
            FROM articles
            WHERE is_favorite = 1
            ORDER BY COALESCE(published_at, created_at) DESC, id DESC
            LIMIT ?
        "#,
        )
        .bind(MAX_ARTICLES)
        .fetch_all(&self.pool)
        .await?;

        Ok(articles)
    }

    // ========================================================================
    // Reader State
    // ========================================================================

    /// Mark article as read (idempotent), returns whether it was changed
    pub async fn mark_article_read(&self, article_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE articles SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(article_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark every unread article of a feed as read, returns how many changed
    pub async fn mark_all_read_for_feed(&self, feed_id: i64) -> Result<u64, DatabaseError> {
        let result =
            sqlx::query("UPDATE articles SET is_read = 1 WHERE feed_id = ? AND is_read = 0")
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Atomically toggle favorite status, returning the new value
    pub async fn toggle_article_favorite(&self, article_id: i64) -> Result<bool, DatabaseError> {
        let (is_favorite,): (bool,) = sqlx::query_as(
            "UPDATE articles SET is_favorite = NOT is_favorite WHERE id = ? RETURNING is_favorite",
        )
        .bind(article_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(is_favorite)
    }
}
