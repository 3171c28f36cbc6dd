//! SQLite document store
//!
//! Documents live in the `entries` table with an optional `expiration`
//! column in unix milliseconds. Keys are unique: writing a key that holds a
//! live document is rejected, while an expired row may be replaced.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use super::{expiry_millis, now_millis, DocumentStore};
use crate::error::StorageError;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value TEXT NOT NULL,
    expiration INTEGER
);

CREATE INDEX IF NOT EXISTS idx_entries_expiration ON entries(expiration);
"#;

/// Relational store backed by an SQLite pool
pub struct SqliteStore {
    pool: SqlitePool,
    expire: Option<Duration>,
}

impl SqliteStore {
    /// Open the pool and create the schema
    pub async fn connect(database_url: &str, expire: Option<Duration>) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, expire).await
    }

    /// Use an existing pool
    pub async fn with_pool(pool: SqlitePool, expire: Option<Duration>) -> Result<Self, StorageError> {
        sqlx::query(SCHEMA_SQL).execute(&pool).await?;
        tracing::info!("Database schema initialized");

        Ok(Self { pool, expire })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn set(&self, key: &str, data: &str, skip_expire: bool) -> bool {
        let result = sqlx::query(
            r#"
            INSERT INTO entries (key, value, expiration)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expiration = excluded.expiration
            WHERE entries.expiration IS NOT NULL AND entries.expiration <= ?
            "#,
        )
        .bind(key)
        .bind(data)
        .bind(expiry_millis(self.expire, skip_expire))
        .bind(now_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => true,
            Ok(_) => {
                tracing::warn!(key = %key, "Rejected write to a live key");
                false
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error persisting value to sqlite");
                false
            }
        }
    }

    async fn get(&self, key: &str, skip_expire: bool) -> Option<String> {
        // Held for the whole read; returned to the pool when dropped on any path
        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, "Error connecting to sqlite");
                return None;
            }
        };

        let row: Option<(i64, String, Option<i64>)> = match sqlx::query_as(
            r#"
            SELECT id, value, expiration
            FROM entries
            WHERE key = ? AND (expiration IS NULL OR expiration > ?)
            "#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&mut *conn)
        .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error retrieving value from sqlite");
                return None;
            }
        };

        let (id, value, expiration) = row?;

        if expiration.is_some() && !skip_expire {
            if let Err(e) = sqlx::query("UPDATE entries SET expiration = ? WHERE id = ?")
                .bind(expiry_millis(self.expire, false))
                .bind(id)
                .execute(&mut *conn)
                .await
            {
                tracing::error!(key = %key, error = %e, "Failed to update expiration on GET");
            }
        }

        Some(value)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn expire(&self) -> Option<Duration> {
        self.expire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(temp_dir: &TempDir, expire: Option<Duration>) -> SqliteStore {
        let url = format!("sqlite:{}", temp_dir.path().join("test.db").display());
        SqliteStore::connect(&url, expire).await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, None).await;

        assert!(store.set("abc", "hello", false).await);
        assert_eq!(store.get("abc", false).await.as_deref(), Some("hello"));
        assert!(store.get("nope", false).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_live_key_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, None).await;

        assert!(store.set("abc", "first", false).await);
        assert!(!store.set("abc", "second", false).await);
        assert_eq!(store.get("abc", false).await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_expired_key_can_be_reused() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, Some(Duration::from_millis(100))).await;

        assert!(store.set("abc", "first", false).await);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(store.get("abc", false).await.is_none());
        assert!(store.set("abc", "second", false).await);
        assert_eq!(store.get("abc", false).await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_sqlite_sliding_expiration() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, Some(Duration::from_millis(400))).await;

        store.set("abc", "hello", false).await;
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(store.get("abc", false).await.is_some());
        }
    }

    #[tokio::test]
    async fn test_static_rows_never_expire() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, Some(Duration::from_millis(50))).await;

        store.set("about", "static", true).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.get("about", true).await.as_deref(), Some("static"));
        // A plain read must not start aging a permanent row
        assert!(store.get("about", false).await.is_some());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get("about", true).await.is_some());
    }

    #[tokio::test]
    async fn test_connections_released_after_reads() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, Some(Duration::from_secs(60))).await;
        store.set("abc", "hello", false).await;

        // More reads than the pool has connections
        for _ in 0..20 {
            assert!(store.get("abc", false).await.is_some());
        }
        assert!(store.pool().num_idle() <= 5);
    }
}
