//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::document::{DocumentService, ServiceOptions};
use crate::notify::Notifier;
use crate::storage::DocumentStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    documents: DocumentService,
    notifier: Notifier,
}

impl AppState {
    /// Wire the document service to an already connected store
    pub fn new(config: Config, store: Arc<dyn DocumentStore>, notifier: Notifier) -> Self {
        let key_generator = config
            .documents
            .key_generator
            .build(config.documents.key_space.as_deref());
        let documents = DocumentService::new(
            store,
            key_generator,
            ServiceOptions::from(&config.documents),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                documents,
                notifier,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the document service
    pub fn documents(&self) -> &DocumentService {
        &self.inner.documents
    }

    /// Get the webhook notifier
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
