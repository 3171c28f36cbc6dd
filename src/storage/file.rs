//! Local filesystem document store
//!
//! Each document is one JSON record named by the SHA-256 of its key, so keys
//! never have to be valid file names. Records are written to a temporary file
//! and renamed into place. Duplicate writes overwrite.
//!
//! Reads and writes of the same key are serialized through a striped lock, so
//! an expired record is only removed if no newer write has replaced it.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::{expiry_millis, now_millis, DocumentStore};
use crate::error::StorageError;

/// On-disk document record
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    data: String,
    /// Unix milliseconds; absent for permanent documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

/// Number of per-key lock stripes
const LOCK_STRIPES: usize = 64;

/// Documents stored as files under a base directory
pub struct FileStore {
    base_path: PathBuf,
    expire: Option<Duration>,
    locks: Vec<Mutex<()>>,
}

impl FileStore {
    /// Create the store, making sure the base directory exists
    pub async fn new(base_path: PathBuf, expire: Option<Duration>) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&base_path).await?;
        tracing::info!("Directory ensured: {}", base_path.display());

        Ok(Self {
            base_path,
            expire,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    fn key_digest(key: &str) -> Vec<u8> {
        Sha256::digest(key.as_bytes()).to_vec()
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.base_path.join(hex::encode(Self::key_digest(key)))
    }

    fn lock_for(&self, key: &str) -> &Mutex<()> {
        &self.locks[Self::key_digest(key)[0] as usize % LOCK_STRIPES]
    }

    async fn write_record(&self, record: &Record) -> Result<(), StorageError> {
        let path = self.record_path(&record.key);
        let tmp_path = path.with_extension(format!("tmp-{:016x}", rand::random::<u64>()));
        let bytes = serde_json::to_vec(record).map_err(std::io::Error::from)?;

        tokio::fs::write(&tmp_path, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn read_record(&self, key: &str) -> Result<Option<Record>, StorageError> {
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: Record = serde_json::from_slice(&bytes).map_err(std::io::Error::from)?;
        Ok(Some(record))
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn set(&self, key: &str, data: &str, skip_expire: bool) -> bool {
        let record = Record {
            key: key.to_string(),
            data: data.to_string(),
            expires_at: expiry_millis(self.expire, skip_expire),
        };

        let _guard = self.lock_for(key).lock().await;
        match self.write_record(&record).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Document saved to file");
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error saving document to file");
                false
            }
        }
    }

    async fn get(&self, key: &str, skip_expire: bool) -> Option<String> {
        let _guard = self.lock_for(key).lock().await;

        let mut record = match self.read_record(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(key = %key, "Document file not found");
                return None;
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error reading document file");
                return None;
            }
        };

        if let Some(expires_at) = record.expires_at {
            if expires_at <= now_millis() {
                tracing::debug!(key = %key, "Document expired");
                if let Err(e) = tokio::fs::remove_file(self.record_path(key)).await {
                    tracing::warn!(key = %key, error = %e, "Failed to remove expired document");
                }
                return None;
            }

            if !skip_expire {
                record.expires_at = expiry_millis(self.expire, false);
                if let Err(e) = self.write_record(&record).await {
                    tracing::error!(key = %key, error = %e, "Failed to update expiration on GET");
                }
            }
        }

        Some(record.data)
    }

    fn name(&self) -> &'static str {
        "file"
    }

    fn expire(&self) -> Option<Duration> {
        self.expire
    }
}
