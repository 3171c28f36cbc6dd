//! Redis document store
//!
//! Expiration uses native key TTLs. Reads push the TTL forward only on keys
//! that already carry one, so documents written with `skip_expire` stay
//! persistent. Duplicate writes overwrite.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};

use super::DocumentStore;
use crate::error::StorageError;

/// Key-value store with native TTL
pub struct RedisStore {
    conn: ConnectionManager,
    expire: Option<Duration>,
}

impl RedisStore {
    /// Connect using a `redis://host:port/db` URL
    pub async fn connect(url: &str, expire: Option<Duration>) -> Result<Self, StorageError> {
        let client = Client::open(url)
            .map_err(|e| StorageError::ConnectionFailed(format!("Invalid redis URL {}: {}", url, e)))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            StorageError::ConnectionFailed(format!("Error connecting to redis on {}: {}", url, e))
        })?;
        tracing::info!("Connected to redis on {}", url);

        Ok(Self { conn, expire })
    }

    fn expire_secs(&self) -> Option<u64> {
        // Redis TTLs are whole seconds
        self.expire.map(|ttl| ttl.as_secs().max(1))
    }

    async fn refresh_expiration(&self, key: &str, secs: u64) -> RedisResult<()> {
        let mut conn = self.conn.clone();

        let ttl: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        if ttl > 0 {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(secs)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn set(&self, key: &str, data: &str, skip_expire: bool) -> bool {
        let mut conn = self.conn.clone();

        // A plain SET also clears any previous TTL
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(data);
        if let (Some(secs), false) = (self.expire_secs(), skip_expire) {
            cmd.arg("EX").arg(secs);
        }

        match cmd.query_async::<_, ()>(&mut conn).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error persisting value to redis");
                false
            }
        }
    }

    async fn get(&self, key: &str, skip_expire: bool) -> Option<String> {
        let mut conn = self.conn.clone();

        let value: Option<String> = match redis::cmd("GET").arg(key).query_async(&mut conn).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error retrieving value from redis");
                return None;
            }
        };

        if let (Some(_), Some(secs), false) = (&value, self.expire_secs(), skip_expire) {
            if let Err(e) = self.refresh_expiration(key, secs).await {
                tracing::error!(key = %key, error = %e, "Failed to set expiry on key");
            }
        }

        value
    }

    fn name(&self) -> &'static str {
        "redis"
    }

    fn expire(&self) -> Option<Duration> {
        self.expire
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a live server: `REDIS_URL=redis://127.0.0.1:6379/15 cargo test
    // --features redis-backend -- --ignored`
    async fn connect(expire: Option<Duration>) -> RedisStore {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string());
        RedisStore::connect(&url, expire).await.unwrap()
    }

    fn unique_key(name: &str) -> String {
        format!("hastebin-test-{}-{:08x}", name, rand::random::<u32>())
    }

    async fn ttl(store: &RedisStore, key: &str) -> i64 {
        let mut conn = store.conn.clone();
        redis::cmd("TTL").arg(key).query_async(&mut conn).await.unwrap()
    }

    async fn shorten(store: &RedisStore, key: &str, secs: u64) {
        let mut conn = store.conn.clone();
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_set_applies_ttl() {
        let store = connect(Some(Duration::from_secs(60))).await;
        let key = unique_key("ttl");

        assert!(store.set(&key, "hello", false).await);
        let remaining = ttl(&store, &key).await;
        assert!(remaining > 0 && remaining <= 60);
        assert_eq!(store.get(&key, false).await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_get_refreshes_ttl() {
        let store = connect(Some(Duration::from_secs(60))).await;
        let key = unique_key("refresh");

        store.set(&key, "hello", false).await;
        shorten(&store, &key, 5).await;

        assert!(store.get(&key, true).await.is_some());
        assert!(ttl(&store, &key).await <= 5);

        assert!(store.get(&key, false).await.is_some());
        assert!(ttl(&store, &key).await > 5);
    }

    #[tokio::test]
    #[ignore]
    async fn test_skip_expire_key_stays_permanent() {
        let store = connect(Some(Duration::from_secs(60))).await;
        let key = unique_key("static");

        assert!(store.set(&key, "about", true).await);
        assert_eq!(ttl(&store, &key).await, -1);

        assert_eq!(store.get(&key, false).await.as_deref(), Some("about"));
        assert_eq!(ttl(&store, &key).await, -1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_missing_key() {
        let store = connect(None).await;
        assert!(store.get(&unique_key("missing"), false).await.is_none());
    }
}
