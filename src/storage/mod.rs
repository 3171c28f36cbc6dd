//! Document storage backends
//!
//! Every backend implements [`DocumentStore`]. Backend errors never cross the
//! trait: writes report `false` and reads report `None`, with the cause logged.
//!
//! Expiration is configured per store. Unless a call passes `skip_expire`,
//! writes stamp "now + expire" and successful reads push the expiry forward.
//! Documents written with `skip_expire` never expire.

mod file;
mod memory;
mod s3;
mod s3_client;
mod sqlite;

#[cfg(feature = "redis-backend")]
mod redis_store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use s3_client::S3Client;
pub use sqlite::SqliteStore;

#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::{StorageConfig, StoreType};
use crate::error::StorageError;

/// Key-addressed document persistence
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `data` under `key`. Returns `false` on any backend failure.
    async fn set(&self, key: &str, data: &str, skip_expire: bool) -> bool;

    /// Fetch the document under `key`, `None` when absent or expired
    async fn get(&self, key: &str, skip_expire: bool) -> Option<String>;

    /// Backend label for diagnostics
    fn name(&self) -> &'static str;

    /// Configured time to live
    fn expire(&self) -> Option<Duration>;
}

/// Build the configured store. Connection failures are fatal to startup.
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn DocumentStore>, StorageError> {
    let expire = config.expire;

    let store: Arc<dyn DocumentStore> = match config.store_type {
        StoreType::Memory => Arc::new(MemoryStore::new(expire)),
        StoreType::File => Arc::new(FileStore::new(config.file.path.clone(), expire).await?),
        StoreType::Sqlite => Arc::new(SqliteStore::connect(&config.database.url, expire).await?),
        StoreType::S3 => {
            let client = S3Client::new(&config.s3).await?;
            Arc::new(S3Store::new(client, expire))
        }
        #[cfg(feature = "redis-backend")]
        StoreType::Redis => Arc::new(RedisStore::connect(&config.redis.url, expire).await?),
        #[cfg(not(feature = "redis-backend"))]
        StoreType::Redis => {
            return Err(StorageError::Unsupported(
                "redis store requires the `redis-backend` feature".to_string(),
            ))
        }
    };

    tracing::info!(
        store = store.name(),
        expire_secs = expire.map(|e| e.as_secs()),
        "Document store ready"
    );

    Ok(store)
}

/// Absolute expiry in unix milliseconds for a write, if one applies.
/// A deadline too far out to represent is treated as no expiry.
pub(crate) fn expiry_millis(expire: Option<Duration>, skip_expire: bool) -> Option<i64> {
    match expire {
        Some(ttl) if !skip_expire => i64::try_from(ttl.as_millis())
            .ok()
            .and_then(|ttl| now_millis().checked_add(ttl)),
        _ => None,
    }
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_millis() {
        assert!(expiry_millis(None, false).is_none());
        assert!(expiry_millis(Some(Duration::from_secs(5)), true).is_none());

        let at = expiry_millis(Some(Duration::from_secs(5)), false).unwrap();
        let delta = at - now_millis();
        assert!(delta > 4_000 && delta <= 5_000);

        assert!(expiry_millis(Some(Duration::MAX), false).is_none());
        assert!(expiry_millis(Some(Duration::from_millis(i64::MAX as u64)), false).is_none());
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let mut config = crate::config::Config::default().storage;
        config.store_type = StoreType::Memory;
        config.expire = Some(Duration::from_secs(60));

        let store = build_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.expire(), Some(Duration::from_secs(60)));
    }

    #[cfg(not(feature = "redis-backend"))]
    #[tokio::test]
    async fn test_build_redis_without_feature() {
        let mut config = crate::config::Config::default().storage;
        config.store_type = StoreType::Redis;

        let result = build_store(&config).await;
        assert!(matches!(result, Err(StorageError::Unsupported(_))));
    }
}
