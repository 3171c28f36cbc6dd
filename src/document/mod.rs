//! Document orchestration
//!
//! Sits between the HTTP routes and the storage backend:
//!
//! ```text
//!   routes ──► DocumentService ──► KeyGenerator
//!                    │
//!                    ▼
//!            Arc<dyn DocumentStore>
//!   (memory | file | sqlite | redis | s3)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use hastebin_server::document::{DocumentService, ServiceOptions};
//!
//! let service = DocumentService::new(store, key_generator, ServiceOptions::default());
//! let key = service.create_document("hello world").await?;
//! let doc = service.retrieve_document(&format!("{key}.txt")).await?;
//! ```

mod error;
mod service;
mod types;

pub use error::{DocumentError, Result};
pub use service::{strip_extension, DocumentService, ServiceOptions};
pub use types::Document;
