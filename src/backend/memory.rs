//! In-process cache backend
//!
//! A hermetic stand-in for a memcached pool with the same observable
//! semantics: conditional store modes, CAS versioning, ASCII-decimal
//! counters, and lazy expiration on read.

use crate::backend::{CacheBackend, StoreMode, validate_key};
use crate::error::BackendError;
use crate::value::{CacheValue, CasToken, Expiry, unix_timestamp};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    /// Expiration timestamp (0 = never expire)
    expire_at: u64,
    cas: u64,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expire_at != 0 && unix_timestamp() >= self.expire_at
    }
}

/// Map-backed cache with memcached semantics
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    versions: AtomicU64,
    disposed: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_live(&self) -> Result<(), BackendError> {
        if self.disposed.load(Ordering::SeqCst) {
            Err(BackendError::Disposed)
        } else {
            Ok(())
        }
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn concat(&self, key: &str, data: &[u8], front: bool) -> Result<bool, BackendError> {
        self.check_live()?;
        validate_key(key)?;
        let mut entries = self.entries.lock();
        match live_entry(&mut entries, key) {
            Some(entry) => {
                let mut buf = Vec::with_capacity(entry.value.data.len() + data.len());
                if front {
                    buf.extend_from_slice(data);
                    buf.extend_from_slice(&entry.value.data);
                } else {
                    buf.extend_from_slice(&entry.value.data);
                    buf.extend_from_slice(data);
                }
                entry.value.data = Bytes::from(buf);
                entry.cas = self.next_version();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn counter(&self, key: &str, amount: u64, incr: bool) -> Result<u64, BackendError> {
        self.check_live()?;
        validate_key(key)?;
        let mut entries = self.entries.lock();
        let Some(entry) = live_entry(&mut entries, key) else {
            return Err(BackendError::KeyNotFound);
        };
        let current = parse_counter(&entry.value.data)?;
        // incr wraps at u64::MAX, decr floors at zero
        let next = if incr {
            current.wrapping_add(amount)
        } else {
            current.saturating_sub(amount)
        };
        let mut buf = itoa::Buffer::new();
        entry.value.data = Bytes::copy_from_slice(buf.format(next).as_bytes());
        entry.cas = self.next_version();
        Ok(next)
    }
}

/// Look up a key, removing it first if it has expired
fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(Entry::is_expired) {
        trace!(key, "lazy expiration: removed expired key");
        entries.remove(key);
        return None;
    }
    entries.get_mut(key)
}

fn parse_counter(data: &[u8]) -> Result<u64, BackendError> {
    let s = std::str::from_utf8(data).map_err(|_| BackendError::NotNumeric)?;
    s.trim().parse::<u64>().map_err(|_| BackendError::NotNumeric)
}

impl CacheBackend for MemoryBackend {
    fn store(
        &self,
        mode: StoreMode,
        key: &str,
        value: &CacheValue,
        expiry: Expiry,
    ) -> Result<bool, BackendError> {
        self.check_live()?;
        validate_key(key)?;
        let mut entries = self.entries.lock();
        let present = live_entry(&mut entries, key).is_some();
        match (mode, present) {
            (StoreMode::Add, true) | (StoreMode::Replace, false) => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: value.clone(),
                        expire_at: expiry.expire_at(),
                        cas: self.next_version(),
                    },
                );
                Ok(true)
            }
        }
    }

    fn check_and_swap(
        &self,
        key: &str,
        value: &CacheValue,
        expiry: Expiry,
        token: CasToken,
    ) -> Result<bool, BackendError> {
        self.check_live()?;
        validate_key(key)?;
        let mut entries = self.entries.lock();
        match live_entry(&mut entries, key) {
            Some(entry) if entry.cas == token.value() => {
                entry.value = value.clone();
                entry.expire_at = expiry.expire_at();
                entry.cas = self.next_version();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn append(&self, key: &str, data: &[u8]) -> Result<bool, BackendError> {
        self.concat(key, data, false)
    }

    fn prepend(&self, key: &str, data: &[u8]) -> Result<bool, BackendError> {
        self.concat(key, data, true)
    }

    fn fetch(&self, key: &str) -> Result<Option<CacheValue>, BackendError> {
        self.check_live()?;
        let mut entries = self.entries.lock();
        Ok(live_entry(&mut entries, key).map(|e| e.value.clone()))
    }

    fn fetch_with_token(
        &self,
        key: &str,
    ) -> Result<Option<(CacheValue, CasToken)>, BackendError> {
        self.check_live()?;
        let mut entries = self.entries.lock();
        Ok(live_entry(&mut entries, key).map(|e| (e.value.clone(), CasToken::new(e.cas))))
    }

    fn fetch_many(&self, keys: &[&str]) -> Result<HashMap<String, CacheValue>, BackendError> {
        self.check_live()?;
        let mut entries = self.entries.lock();
        let mut result = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = live_entry(&mut entries, key) {
                result.insert((*key).to_string(), entry.value.clone());
            }
        }
        Ok(result)
    }

    fn fetch_many_with_tokens(
        &self,
        keys: &[&str],
    ) -> Result<(HashMap<String, CacheValue>, HashMap<String, CasToken>), BackendError> {
        self.check_live()?;
        let mut entries = self.entries.lock();
        let mut values = HashMap::with_capacity(keys.len());
        let mut tokens = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = live_entry(&mut entries, key) {
                values.insert((*key).to_string(), entry.value.clone());
                tokens.insert((*key).to_string(), CasToken::new(entry.cas));
            }
        }
        Ok((values, tokens))
    }

    fn increment(&self, key: &str, amount: u64) -> Result<u64, BackendError> {
        self.counter(key, amount, true)
    }

    fn decrement(&self, key: &str, amount: u64) -> Result<u64, BackendError> {
        self.counter(key, amount, false)
    }

    fn touch(&self, key: &str, expiry: Expiry) -> Result<bool, BackendError> {
        self.check_live()?;
        validate_key(key)?;
        let mut entries = self.entries.lock();
        match live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expire_at = expiry.expire_at();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, key: &str) -> Result<bool, BackendError> {
        self.check_live()?;
        let mut entries = self.entries.lock();
        let existed = live_entry(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    fn flush(&self) -> Result<(), BackendError> {
        self.check_live()?;
        self.entries.lock().clear();
        Ok(())
    }

    fn dispose(&self) -> Result<(), BackendError> {
        // Idempotent: a second dispose is a no-op, not an error
        self.disposed.store(true, Ordering::SeqCst);
        self.entries.lock().clear();
        Ok(())
    }
}
