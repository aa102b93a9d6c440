use super::schema::Database;
use super::types::{Article, DatabaseError};

impl Database {
    // ========================================================================
    // Pins ("read later", in pin order)
    // ========================================================================

    /// Pin an article. Pinning an already pinned article is a no-op.
    ///
    /// Returns whether a new pin was created.
    pub async fn pin_article(&self, article_id: i64) -> Result<bool, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO pins (article_id, created_at) VALUES (?, ?) ON CONFLICT(article_id) DO NOTHING",
        )
        .bind(article_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a pin, returns whether one existed
    pub async fn unpin_article(&self, article_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM pins WHERE article_id = ?")
            .bind(article_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pinned articles, oldest pin first
    pub async fn pinned_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        let articles = sqlx::query_as::<_, Article>(
            r#"
            SELECT a.id, a.feed_id, a.url, a.title, a.content, a.summary, a.author,
                   a.published_at, a.thumbnail_url, a.is_read, a.is_favorite,
                   a.created_at, a.updated_at
            FROM pins p
            JOIN articles a ON a.id = p.article_id
            ORDER BY p.id
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }
}
