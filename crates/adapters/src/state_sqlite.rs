//! SQLite state store implementation
//!
//! One database file holds both persisted components: the post ledger and
//! the day marker. All mutation goes through the port contracts.

use async_trait::async_trait;
use feed_herald_domain::{DayTracker, LedgerError, PostId, PostLedger, PostRecord};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;

/// SQLite-backed post ledger and day tracker
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations.
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db_path = db_path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Database(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                link TEXT PRIMARY KEY,
                pin_days INTEGER NOT NULL DEFAULT 0,
                featured INTEGER NOT NULL DEFAULT 0,
                post_id INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS day_marker (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                day INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }
}

fn row_to_record(row: (String, i64, i64, Option<i64>)) -> PostRecord {
    let (link, pin_days, featured, post_id) = row;
    PostRecord {
        link,
        pin_days,
        featured: featured != 0,
        post_id: post_id.map(PostId),
    }
}

#[async_trait]
impl PostLedger for SqliteStore {
    async fn record_if_new(&self, link: &str, pin_days: i64) -> Result<bool, LedgerError> {
        // The primary key makes concurrent inserts for one link collapse to
        // a single row; first-seen wins.
        let result = sqlx::query(
            "INSERT OR IGNORE INTO posts (link, pin_days, featured) VALUES (?, ?, ?)",
        )
        .bind(link)
        .bind(pin_days)
        .bind(pin_days > 0)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, link: &str) -> Result<Option<PostRecord>, LedgerError> {
        let row: Option<(String, i64, i64, Option<i64>)> = sqlx::query_as(
            "SELECT link, pin_days, featured, post_id FROM posts WHERE link = ?",
        )
        .bind(link)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(row.map(row_to_record))
    }

    async fn set_post_id(&self, link: &str, post_id: PostId) -> Result<(), LedgerError> {
        sqlx::query("UPDATE posts SET post_id = ? WHERE link = ?")
            .bind(post_id.0)
            .bind(link)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    async fn decrement_all_featured(&self) -> Result<Vec<PostRecord>, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        sqlx::query("UPDATE posts SET pin_days = pin_days - 1 WHERE featured = 1")
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        let rows: Vec<(String, i64, i64, Option<i64>)> = sqlx::query_as(
            r#"
            SELECT link, pin_days, featured, post_id FROM posts
            WHERE featured = 1 AND pin_days = 0
            ORDER BY link
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    async fn clear_featured(&self, link: &str) -> Result<(), LedgerError> {
        sqlx::query("UPDATE posts SET featured = 0 WHERE link = ?")
            .bind(link)
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(count.0 as u64)
    }
}

#[async_trait]
impl DayTracker for SqliteStore {
    async fn current(&self) -> Result<Option<u8>, LedgerError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT day FROM day_marker WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(row.map(|(day,)| day as u8))
    }

    async fn advance_if_changed(&self, day: u8) -> Result<bool, LedgerError> {
        // Single statement, so the check and the set cannot interleave with
        // a concurrent caller.
        let result = sqlx::query(
            r#"
            INSERT INTO day_marker (id, day) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET day = excluded.day
            WHERE day_marker.day <> excluded.day
            "#,
        )
        .bind(day as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
