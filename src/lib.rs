//! Hastebin Server Library
//!
//! A key-addressed paste store: clients submit text, receive a short
//! generated key, and read the text back by key. The main server binary is
//! in main.rs.
//!
//! # Modules
//!
//! - `document`: key selection, creation and retrieval
//! - `storage`: the `DocumentStore` trait and its backends
//! - `keygen`: phonetic and random key generators
//! - `routes`: the HTTP API

pub mod config;
pub mod document;
pub mod error;
pub mod keygen;
pub mod notify;
pub mod routes;
pub mod state;
pub mod storage;
