//! Object storage document store
//!
//! S3 has no per-object TTL this store can set, so a configured expiration is
//! accepted but not enforced. Every write or read that would have applied it
//! logs a warning. Duplicate writes overwrite.

use std::time::Duration;

use async_trait::async_trait;

use super::{DocumentStore, S3Client};
use crate::error::StorageError;

const CONTENT_TYPE: &str = "text/plain; charset=UTF-8";

/// Documents stored as objects named by their key
pub struct S3Store {
    client: S3Client,
    expire: Option<Duration>,
}

impl S3Store {
    pub fn new(client: S3Client, expire: Option<Duration>) -> Self {
        if expire.is_some() {
            tracing::warn!("S3 store cannot set expirations on keys; documents will be kept");
        }
        Self { client, expire }
    }

    fn warn_unenforced_expiry(&self, key: &str, skip_expire: bool) {
        if self.expire.is_some() && !skip_expire {
            tracing::warn!(key = %key, "S3 store cannot set expirations on keys");
        }
    }
}

#[async_trait]
impl DocumentStore for S3Store {
    async fn set(&self, key: &str, data: &str, skip_expire: bool) -> bool {
        match self
            .client
            .put_object(key, data.as_bytes().to_vec(), CONTENT_TYPE)
            .await
        {
            Ok(()) => {
                self.warn_unenforced_expiry(key, skip_expire);
                true
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error saving to S3");
                false
            }
        }
    }

    async fn get(&self, key: &str, skip_expire: bool) -> Option<String> {
        let bytes = match self.client.get_object(key).await {
            Ok(bytes) => bytes,
            Err(StorageError::ObjectNotFound(_)) => return None,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Error retrieving from S3");
                return None;
            }
        };

        match String::from_utf8(bytes) {
            Ok(text) => {
                self.warn_unenforced_expiry(key, skip_expire);
                Some(text)
            }
            Err(e) => {
                tracing::error!(key = %key, error = %e, "S3 object is not valid UTF-8");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "s3"
    }

    fn expire(&self) -> Option<Duration> {
        self.expire
    }
}
