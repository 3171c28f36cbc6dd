//! In-process document store
//!
//! Sliding expiration, checked on read. An expired entry is evicted when it is
//! next read, and writes periodically sweep every expired entry out of the map.
//! Duplicate writes overwrite.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DocumentStore;

/// Upper bound on the time between sweeps
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    data: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug)]
struct Shelf {
    entries: HashMap<String, Entry>,
    next_sweep: Instant,
}

/// Documents held in a process-local map
pub struct MemoryStore {
    shelf: RwLock<Shelf>,
    expire: Option<Duration>,
}

impl MemoryStore {
    pub fn new(expire: Option<Duration>) -> Self {
        Self {
            shelf: RwLock::new(Shelf {
                entries: HashMap::new(),
                next_sweep: Instant::now(),
            }),
            expire,
        }
    }

    /// Number of entries held, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.shelf.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shelf.read().await.entries.is_empty()
    }

    fn sweep_interval(&self) -> Duration {
        self.expire
            .map_or(MAX_SWEEP_INTERVAL, |ttl| ttl.min(MAX_SWEEP_INTERVAL))
    }

    /// `None` when no expiry applies, or when the deadline is out of range
    fn deadline(&self, now: Instant) -> Option<Instant> {
        self.expire.and_then(|ttl| now.checked_add(ttl))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn set(&self, key: &str, data: &str, skip_expire: bool) -> bool {
        let now = Instant::now();
        let expires_at = if skip_expire { None } else { self.deadline(now) };

        let mut shelf = self.shelf.write().await;

        if self.expire.is_some() && now >= shelf.next_sweep {
            let before = shelf.entries.len();
            shelf.entries.retain(|_, entry| !entry.is_expired(now));
            let swept = before - shelf.entries.len();
            if swept > 0 {
                tracing::debug!(swept, "Swept expired documents");
            }
            shelf.next_sweep = now.checked_add(self.sweep_interval()).unwrap_or(now);
        }

        shelf.entries.insert(
            key.to_string(),
            Entry {
                data: data.to_string(),
                expires_at,
            },
        );

        true
    }

    async fn get(&self, key: &str, skip_expire: bool) -> Option<String> {
        let now = Instant::now();
        let mut shelf = self.shelf.write().await;

        let entry = shelf.entries.get_mut(key)?;
        if entry.is_expired(now) {
            tracing::debug!(key = %key, "Document expired");
            shelf.entries.remove(key);
            return None;
        }

        if entry.expires_at.is_some() && !skip_expire {
            if let Some(deadline) = self.deadline(now) {
                entry.expires_at = Some(deadline);
            }
        }

        Some(entry.data.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn expire(&self) -> Option<Duration> {
        self.expire
    }
}
