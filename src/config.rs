//! Configuration management for Hastebin Server

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::keygen::KeyGeneratorKind;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub documents: DocumentsConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served for unmatched paths (the web client)
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub store_type: StoreType,
    /// Time to live for documents; `None` stores them permanently
    pub expire: Option<Duration>,
    pub file: FileStoreConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub s3: S3Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    Memory,
    File,
    Sqlite,
    Redis,
    S3,
}

impl StoreType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Some(StoreType::Memory),
            "file" => Some(StoreType::File),
            "sqlite" => Some(StoreType::Sqlite),
            "redis" => Some(StoreType::Redis),
            "s3" | "amazon-s3" => Some(StoreType::S3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileStoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services (MinIO, R2)
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    pub key_length: usize,
    pub key_generator: KeyGeneratorKind,
    /// Alphabet for the random key generator
    pub key_space: Option<String>,
    /// Maximum document length in characters
    pub max_length: Option<usize>,
    /// Static documents preloaded at startup: key -> source path
    pub static_documents: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
}

pub const DEFAULT_KEY_LENGTH: usize = 10;
pub const DEFAULT_MAX_LENGTH: usize = 400_000;
/// Longest accepted document lifetime (ten years)
pub const MAX_EXPIRE_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 7777,
                static_dir: None,
            },
            storage: StorageConfig {
                store_type: StoreType::File,
                expire: None,
                file: FileStoreConfig {
                    path: PathBuf::from("./data"),
                },
                database: DatabaseConfig {
                    url: "sqlite:./hastebin.db".to_string(),
                },
                redis: RedisConfig {
                    url: "redis://127.0.0.1:6379/0".to_string(),
                },
                s3: S3Config {
                    bucket: "hastebin".to_string(),
                    region: Some("us-east-1".to_string()),
                    endpoint: None,
                    access_key: None,
                    secret_key: None,
                },
            },
            documents: DocumentsConfig {
                key_length: DEFAULT_KEY_LENGTH,
                key_generator: KeyGeneratorKind::Phonetic,
                key_space: None,
                max_length: Some(DEFAULT_MAX_LENGTH),
                static_documents: BTreeMap::new(),
            },
            notifications: NotificationConfig { webhook_url: None },
        }
    }
}

/// Error raised for malformed configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let store_type = match env::var("STORAGE_TYPE") {
            Ok(value) => StoreType::parse(&value).ok_or(ConfigError::InvalidValue {
                name: "STORAGE_TYPE",
                value,
            })?,
            Err(_) => defaults.storage.store_type,
        };

        let key_generator = match env::var("KEY_GENERATOR") {
            Ok(value) => KeyGeneratorKind::parse(&value).ok_or(ConfigError::InvalidValue {
                name: "KEY_GENERATOR",
                value,
            })?,
            Err(_) => defaults.documents.key_generator,
        };

        let key_length = parse_var("KEY_LENGTH")?.unwrap_or(DEFAULT_KEY_LENGTH);
        if key_length == 0 {
            return Err(ConfigError::InvalidValue {
                name: "KEY_LENGTH",
                value: "0".to_string(),
            });
        }

        let static_documents = match env::var("STATIC_DOCUMENTS") {
            Ok(value) => parse_static_documents(&value)?,
            Err(_) => BTreeMap::new(),
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: parse_var("PORT")?.unwrap_or(defaults.server.port),
                static_dir: env::var("STATIC_DIR").ok().map(PathBuf::from),
            },
            storage: StorageConfig {
                store_type,
                expire: parse_var::<u64>("STORAGE_EXPIRE")?.and_then(expire_from_secs),
                file: FileStoreConfig {
                    path: env::var("STORAGE_PATH")
                        .map(PathBuf::from)
                        .unwrap_or(defaults.storage.file.path),
                },
                database: DatabaseConfig {
                    url: env::var("DATABASE_URL").unwrap_or(defaults.storage.database.url),
                },
                redis: RedisConfig {
                    url: env::var("REDIS_URL").unwrap_or(defaults.storage.redis.url),
                },
                s3: S3Config {
                    bucket: env::var("S3_BUCKET").unwrap_or(defaults.storage.s3.bucket),
                    region: env::var("S3_REGION").ok().or(defaults.storage.s3.region),
                    endpoint: env::var("S3_ENDPOINT").ok(),
                    access_key: env::var("S3_ACCESS_KEY").ok(),
                    secret_key: env::var("S3_SECRET_KEY").ok(),
                },
            },
            documents: DocumentsConfig {
                key_length,
                key_generator,
                key_space: env::var("KEY_SPACE").ok().filter(|s| !s.is_empty()),
                max_length: match parse_var::<usize>("MAX_LENGTH")? {
                    Some(0) => None,
                    Some(max) => Some(max),
                    None => defaults.documents.max_length,
                },
                static_documents,
            },
            notifications: NotificationConfig {
                webhook_url: env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}

/// `0` disables expiry; values past [`MAX_EXPIRE_SECS`] are clamped
fn expire_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        return None;
    }
    if secs > MAX_EXPIRE_SECS {
        tracing::warn!(
            "STORAGE_EXPIRE of {}s is out of range, clamping to {}s",
            secs,
            MAX_EXPIRE_SECS
        );
    }
    Some(Duration::from_secs(secs.min(MAX_EXPIRE_SECS)))
}

/// Parse `name=path,name=path` into the static document registry
pub fn parse_static_documents(value: &str) -> Result<BTreeMap<String, PathBuf>, ConfigError> {
    let mut documents = BTreeMap::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, path) = entry
            .split_once('=')
            .map(|(n, p)| (n.trim(), p.trim()))
            .filter(|(n, p)| !n.is_empty() && !p.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "STATIC_DOCUMENTS",
                value: entry.to_string(),
            })?;
        documents.insert(name.to_string(), PathBuf::from(path));
    }

    Ok(documents)
}
