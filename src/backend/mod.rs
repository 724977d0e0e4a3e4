//! Cache backend capability
//!
//! [`CacheBackend`] is the seam between the facade and whatever actually
//! stores data: the pooled memcached client in production
//! ([`MemcachedBackend`]), or an in-process map in tests
//! ([`MemoryBackend`]). The facade owns nothing but a shared handle to one
//! of these.

mod memcached;
mod memory;

pub use memcached::MemcachedBackend;
pub use memory::MemoryBackend;

use crate::error::BackendError;
use crate::value::{CacheValue, CasToken, Expiry};
use std::collections::HashMap;
use std::fmt;

/// Maximum key length (memcached spec)
pub const MAX_KEY_LENGTH: usize = 250;

/// Conditional store modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Store only if the key is absent
    Add,
    /// Store unconditionally
    Set,
    /// Store only if the key is present
    Replace,
}

impl StoreMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Set => "set",
            Self::Replace => "replace",
        }
    }
}

/// The opaque cache capability the facade delegates to
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Store a value under one of the conditional modes
    ///
    /// Returns `false` when the mode's condition fails (`Add` on a present
    /// key, `Replace` on an absent one).
    fn store(
        &self,
        mode: StoreMode,
        key: &str,
        value: &CacheValue,
        expiry: Expiry,
    ) -> Result<bool, BackendError>;

    /// Store only if the entry's version still matches `token`
    fn check_and_swap(
        &self,
        key: &str,
        value: &CacheValue,
        expiry: Expiry,
        token: CasToken,
    ) -> Result<bool, BackendError>;

    /// Concatenate raw bytes after an existing value
    fn append(&self, key: &str, data: &[u8]) -> Result<bool, BackendError>;

    /// Concatenate raw bytes before an existing value
    fn prepend(&self, key: &str, data: &[u8]) -> Result<bool, BackendError>;

    /// Fetch a single value
    fn fetch(&self, key: &str) -> Result<Option<CacheValue>, BackendError>;

    /// Fetch a single value together with its version token
    fn fetch_with_token(
        &self,
        key: &str,
    ) -> Result<Option<(CacheValue, CasToken)>, BackendError>;

    /// Fetch many values; absent keys are omitted from the map
    fn fetch_many(&self, keys: &[&str]) -> Result<HashMap<String, CacheValue>, BackendError>;

    /// Fetch many values plus an out-of-band map of version tokens
    #[allow(clippy::type_complexity)]
    fn fetch_many_with_tokens(
        &self,
        keys: &[&str],
    ) -> Result<(HashMap<String, CacheValue>, HashMap<String, CasToken>), BackendError>;

    /// Increment a decimal counter, returning the new value
    fn increment(&self, key: &str, amount: u64) -> Result<u64, BackendError>;

    /// Decrement a decimal counter, returning the new value
    fn decrement(&self, key: &str, amount: u64) -> Result<u64, BackendError>;

    /// Update the expiry of an existing entry
    fn touch(&self, key: &str, expiry: Expiry) -> Result<bool, BackendError>;

    /// Remove a key, reporting whether it existed
    fn remove(&self, key: &str) -> Result<bool, BackendError>;

    /// Drop every entry
    fn flush(&self) -> Result<(), BackendError>;

    /// Release the backend's resources; later calls fail with
    /// [`BackendError::Disposed`]. Safe to call more than once.
    fn dispose(&self) -> Result<(), BackendError>;
}

/// Check if a key is valid
///
/// Keys cannot be empty, exceed [`MAX_KEY_LENGTH`], or contain control
/// characters or whitespace.
pub fn is_valid_key(key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    key.bytes().all(|b| b > 32 && b < 127)
}

/// Reject invalid keys before they reach the store
pub(crate) fn validate_key(key: &str) -> Result<(), BackendError> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(BackendError::KeyTooLong);
    }
    if !is_valid_key(key) {
        return Err(BackendError::InvalidKey(key.to_string()));
    }
    Ok(())
}
