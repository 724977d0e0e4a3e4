//! Error types for stoacache

use thiserror::Error;

/// Main error type for stoacache
#[derive(Error, Debug)]
pub enum StoaCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Value encoding error: {0}")]
    Encoding(String),

    #[error("Value decoding error: {0}")]
    Decoding(String),
}

/// Endpoint and pool configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Empty endpoint")]
    EmptyEndpoint,

    #[error("Malformed endpoint '{0}': expected address[:port]")]
    MalformedEndpoint(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("No cache servers configured")]
    NoServers,

    #[error("Failed to read config file: {0}")]
    Read(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

/// Errors surfaced by the wrapped cache client
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Memcached error: {0}")]
    Memcached(#[from] memcache::MemcacheError),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key too long (max 250 bytes)")]
    KeyTooLong,

    #[error("Not a numeric value")]
    NotNumeric,

    #[error("Client already disposed")]
    Disposed,
}

pub type Result<T> = std::result::Result<T, StoaCacheError>;
