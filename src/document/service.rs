//! Document creation and retrieval
//!
//! # Key selection
//!
//! Candidates are drawn until one is not present in the store, then written.
//! The loop has no retry bound: it terminates as long as the key space is
//! much larger than the number of live documents. Running out of keys is a
//! configuration problem (raise the key length), not a runtime condition.
//!
//! Check-then-set is not atomic. Two writers can both see a candidate as
//! free; what happens next is up to the backend (the sqlite store rejects
//! the second write, the others overwrite). Within one process a collision
//! additionally needs two identical random draws in flight at once.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use super::error::{DocumentError, Result};
use super::types::Document;
use crate::config::{DocumentsConfig, DEFAULT_KEY_LENGTH, DEFAULT_MAX_LENGTH};
use crate::keygen::KeyGenerator;
use crate::storage::DocumentStore;

/// Tunables for [`DocumentService`]
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub key_length: usize,
    /// Maximum document length in characters
    pub max_length: Option<usize>,
    /// Static documents: key -> source path
    pub static_documents: BTreeMap<String, PathBuf>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            key_length: DEFAULT_KEY_LENGTH,
            max_length: Some(DEFAULT_MAX_LENGTH),
            static_documents: BTreeMap::new(),
        }
    }
}

impl From<&DocumentsConfig> for ServiceOptions {
    fn from(config: &DocumentsConfig) -> Self {
        Self {
            key_length: config.key_length,
            max_length: config.max_length,
            static_documents: config.static_documents.clone(),
        }
    }
}

/// Creates and serves documents against a pluggable store
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    key_generator: Box<dyn KeyGenerator>,
    key_length: usize,
    max_length: Option<usize>,
    static_documents: BTreeMap<String, PathBuf>,
    static_keys: HashSet<String>,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        key_generator: Box<dyn KeyGenerator>,
        options: ServiceOptions,
    ) -> Self {
        let static_keys = options.static_documents.keys().cloned().collect();

        Self {
            store,
            key_generator,
            key_length: options.key_length,
            max_length: options.max_length,
            static_documents: options.static_documents,
            static_keys,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Whether `key` is a preloaded static document
    pub fn is_static(&self, key: &str) -> bool {
        self.static_keys.contains(key)
    }

    /// Store new content under a freshly chosen key
    pub async fn create_document(&self, content: &str) -> Result<String> {
        if let Some(max) = self.max_length {
            if content.chars().count() > max {
                return Err(DocumentError::TooLarge { max });
            }
        }

        let key = self.choose_key().await;

        if !self.store.set(&key, content, false).await {
            return Err(DocumentError::StorageFailure(key));
        }

        tracing::info!(key = %key, length = content.len(), "Added document");
        Ok(key)
    }

    /// Look up a document by identifier, ignoring any `.extension` suffix
    pub async fn retrieve_document(&self, raw_key: &str) -> Result<Document> {
        let key = strip_extension(raw_key);
        if key.is_empty() {
            return Err(DocumentError::NotFound(raw_key.to_string()));
        }

        let skip_expire = self.is_static(key);

        match self.store.get(key, skip_expire).await {
            Some(data) => {
                tracing::info!(key = %key, "Retrieved document");
                Ok(Document {
                    data,
                    key: key.to_string(),
                })
            }
            None => {
                tracing::warn!(key = %key, "Document not found");
                Err(DocumentError::NotFound(key.to_string()))
            }
        }
    }

    /// Write every static document into the store without expiration.
    /// Returns how many were loaded; unreadable sources are skipped.
    pub async fn load_static_documents(&self) -> usize {
        let mut loaded = 0;

        for (name, path) in &self.static_documents {
            let data = match tokio::fs::read_to_string(path).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(
                        name = %name,
                        path = %path.display(),
                        error = %e,
                        "Failed to load static document"
                    );
                    continue;
                }
            };

            if self.store.set(name, &data, true).await {
                tracing::debug!(name = %name, "Loaded static document");
                loaded += 1;
            } else {
                tracing::warn!(name = %name, "Failed to store static document");
            }
        }

        loaded
    }

    async fn choose_key(&self) -> String {
        loop {
            let candidate = self.key_generator.create_key(self.key_length);
            // Probing must not refresh the expiry of someone else's document
            if self.store.get(&candidate, true).await.is_none() {
                return candidate;
            }
            tracing::debug!(key = %candidate, "Key collision, drawing another");
        }
    }
}

/// Drop everything from the first `.` on: `abc.md` -> `abc`
pub fn strip_extension(raw_key: &str) -> &str {
    raw_key.split_once('.').map_or(raw_key, |(key, _)| key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::{KeyGeneratorKind, PhoneticKeyGenerator};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Replays a fixed sequence of keys
    struct ScriptedKeys(Mutex<VecDeque<String>>);

    impl ScriptedKeys {
        fn new(keys: &[&str]) -> Self {
            Self(Mutex::new(keys.iter().map(|k| k.to_string()).collect()))
        }
    }

    impl KeyGenerator for ScriptedKeys {
        fn create_key(&self, _length: usize) -> String {
            self.0.lock().unwrap().pop_front().expect("ran out of scripted keys")
        }
    }

    /// Store whose writes always fail
    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn set(&self, _key: &str, _data: &str, _skip_expire: bool) -> bool {
            false
        }

        async fn get(&self, _key: &str, _skip_expire: bool) -> Option<String> {
            None
        }

        fn name(&self) -> &'static str {
            "failing"
        }

        fn expire(&self) -> Option<Duration> {
            None
        }
    }

    fn service(store: Arc<dyn DocumentStore>, options: ServiceOptions) -> DocumentService {
        DocumentService::new(store, Box::new(PhoneticKeyGenerator), options)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let svc = service(Arc::new(MemoryStore::new(None)), ServiceOptions::default());

        let key = svc.create_document("hello world").await.unwrap();
        assert_eq!(key.len(), 10);

        let doc = svc.retrieve_document(&key).await.unwrap();
        assert_eq!(doc.data, "hello world");
        assert_eq!(doc.key, key);
    }

    #[tokio::test]
    async fn test_too_large_persists_nothing() {
        let store = Arc::new(MemoryStore::new(None));
        let options = ServiceOptions {
            max_length: Some(5),
            ..Default::default()
        };
        let svc = service(store.clone(), options);

        let result = svc.create_document("way too long").await;
        assert!(matches!(result, Err(DocumentError::TooLarge { max: 5 })));
        assert!(store.is_empty().await);

        // Limit counts characters, not bytes
        assert!(svc.create_document("héllo").await.is_ok());
    }

    #[tokio::test]
    async fn test_no_max_length() {
        let options = ServiceOptions {
            max_length: None,
            ..Default::default()
        };
        let svc = service(Arc::new(MemoryStore::new(None)), options);
        let big = "x".repeat(1_000_000);
        assert!(svc.create_document(&big).await.is_ok());
    }

    #[tokio::test]
    async fn test_sequential_keys_are_distinct() {
        let svc = service(Arc::new(MemoryStore::new(None)), ServiceOptions::default());

        let mut keys = HashSet::new();
        for i in 0..500 {
            let key = svc.create_document(&format!("doc {i}")).await.unwrap();
            assert!(keys.insert(key));
        }
    }

    #[tokio::test]
    async fn test_collision_draws_again() {
        let store = Arc::new(MemoryStore::new(None));
        store.set("taken", "existing", false).await;

        let svc = DocumentService::new(
            store.clone(),
            Box::new(ScriptedKeys::new(&["taken", "taken", "fresh"])),
            ServiceOptions::default(),
        );

        let key = svc.create_document("new").await.unwrap();
        assert_eq!(key, "fresh");
        assert_eq!(store.get("taken", false).await.as_deref(), Some("existing"));
    }

    #[tokio::test]
    async fn test_tiny_key_space_still_unique() {
        let svc = DocumentService::new(
            Arc::new(MemoryStore::new(None)),
            KeyGeneratorKind::Random.build(Some("ab")),
            ServiceOptions {
                key_length: 3,
                ..Default::default()
            },
        );

        // 8 possible keys, all of them get used exactly once
        let mut keys = HashSet::new();
        for i in 0..8 {
            keys.insert(svc.create_document(&i.to_string()).await.unwrap());
        }
        assert_eq!(keys.len(), 8);
    }

    #[tokio::test]
    async fn test_storage_failure() {
        let svc = service(Arc::new(FailingStore), ServiceOptions::default());
        let result = svc.create_document("hello").await;
        assert!(matches!(result, Err(DocumentError::StorageFailure(_))));
    }

    #[tokio::test]
    async fn test_suffix_stripping() {
        let svc = service(Arc::new(MemoryStore::new(None)), ServiceOptions::default());
        let key = svc.create_document("# title").await.unwrap();

        let plain = svc.retrieve_document(&key).await.unwrap();
        let with_ext = svc.retrieve_document(&format!("{key}.md")).await.unwrap();
        assert_eq!(plain, with_ext);
    }

    #[tokio::test]
    async fn test_not_found() {
        let svc = service(Arc::new(MemoryStore::new(None)), ServiceOptions::default());
        assert!(matches!(
            svc.retrieve_document("doesnotexist").await,
            Err(DocumentError::NotFound(_))
        ));
        assert!(matches!(
            svc.retrieve_document(".txt").await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_document_not_found() {
        let svc = service(
            Arc::new(MemoryStore::new(Some(Duration::from_millis(100)))),
            ServiceOptions::default(),
        );
        let key = svc.create_document("short lived").await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(matches!(
            svc.retrieve_document(&key).await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_static_documents_survive_expiry() {
        let temp_dir = TempDir::new().unwrap();
        let about = temp_dir.path().join("about.md");
        tokio::fs::write(&about, "# About").await.unwrap();

        let mut static_documents = BTreeMap::new();
        static_documents.insert("about".to_string(), about);
        static_documents.insert("missing".to_string(), temp_dir.path().join("nope.md"));

        let svc = service(
            Arc::new(MemoryStore::new(Some(Duration::from_millis(100)))),
            ServiceOptions {
                static_documents,
                ..Default::default()
            },
        );

        assert_eq!(svc.load_static_documents().await, 1);
        assert!(svc.is_static("about"));

        tokio::time::sleep(Duration::from_millis(250)).await;

        let doc = svc.retrieve_document("about.md").await.unwrap();
        assert_eq!(doc.data, "# About");
        assert_eq!(doc.key, "about");
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("abc123.md"), "abc123");
        assert_eq!(strip_extension("abc123"), "abc123");
        assert_eq!(strip_extension("abc.tar.gz"), "abc");
        assert_eq!(strip_extension(".hidden"), "");
    }
}
