//! The cache facade
//!
//! [`StoaCache`] presents the stable key/value contract callers depend on
//! and forwards every operation to a [`CacheBackend`]. Failures funnel
//! through the shared [`Interceptor`]; the one exception is
//! [`StoaCache::get_many_with_cas`], whose out-of-band token map cannot
//! flow through the wrapper's single return channel, so it reaches the
//! backend directly and its failures propagate raw.

use crate::backend::{CacheBackend, MemcachedBackend, StoreMode};
use crate::config::{Endpoint, PoolConfig};
use crate::error::{ConfigError, Result, StoaCacheError};
use crate::intercept::{FailureMode, Interceptor};
use crate::metrics::Metrics;
use crate::value::{CacheValue, CasToken, Expiry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Backend-independent cache client
///
/// Stateless beyond a shared backend handle; cloning is cheap and clones
/// share the same pool and metrics.
///
/// ```
/// use std::sync::Arc;
/// use stoacache::backend::MemoryBackend;
/// use stoacache::intercept::FailureMode;
/// use stoacache::value::Expiry;
/// use stoacache::StoaCache;
///
/// let cache = StoaCache::with_backend(Arc::new(MemoryBackend::new()), FailureMode::Propagate);
/// assert!(cache.set("greeting", "hello", Expiry::Never).unwrap());
/// assert_eq!(cache.get("greeting").unwrap().unwrap().as_bytes(), b"hello");
/// ```
#[derive(Clone)]
pub struct StoaCache {
    backend: Arc<dyn CacheBackend>,
    intercept: Interceptor,
    metrics: Arc<Metrics>,
}

impl StoaCache {
    /// Connect to the servers named by `"address[:port]"` strings
    ///
    /// Any malformed element fails construction; omitted ports default to
    /// 11211. Pool sizing uses [`PoolConfig::default`].
    pub fn from_hosts<S: AsRef<str>>(hosts: &[S]) -> Result<Self> {
        let endpoints = hosts
            .iter()
            .map(|h| h.as_ref().parse::<Endpoint>())
            .collect::<std::result::Result<Vec<_>, ConfigError>>()?;
        Self::from_endpoints(endpoints)
    }

    /// Connect to pre-built endpoints; an empty list fails
    pub fn from_endpoints(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoServers.into());
        }
        let config = PoolConfig::default();
        let backend = MemcachedBackend::connect(&endpoints, &config)?;
        Ok(Self::with_backend(Arc::new(backend), config.on_error))
    }

    /// Connect as described by a full [`PoolConfig`] (file/env loaded)
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        let endpoints = config.endpoints()?;
        let backend = MemcachedBackend::connect(&endpoints, config)?;
        Ok(Self::with_backend(Arc::new(backend), config.on_error))
    }

    /// Wrap an already-constructed backend handle
    pub fn with_backend(backend: Arc<dyn CacheBackend>, on_error: FailureMode) -> Self {
        let metrics = Arc::new(Metrics::new());
        let intercept = Interceptor::new(on_error, Arc::clone(&metrics));
        Self {
            backend,
            intercept,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.intercept.mode()
    }

    /// Remove a key, reporting whether it existed
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.metrics.cmd_delete.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept.execute("remove", || self.backend.remove(key))
    }

    /// Fetch a value
    pub fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        self.metrics.cmd_get.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let result = self.intercept.execute("get", || self.backend.fetch(key))?;
        if result.is_some() {
            self.metrics.get_hits.inc();
        } else {
            self.metrics.get_misses.inc();
        }
        Ok(result)
    }

    /// Fetch and deserialize a value stored with [`StoaCache::set_as`]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(value) => {
                let decoded = serde_json::from_slice(&value.data)
                    .map_err(|e| StoaCacheError::Decoding(e.to_string()))?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    /// Fetch a value together with its version token
    pub fn get_with_cas(&self, key: &str) -> Result<Option<(CacheValue, CasToken)>> {
        self.metrics.cmd_get.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let result = self
            .intercept
            .execute("get_with_cas", || self.backend.fetch_with_token(key))?;
        if result.is_some() {
            self.metrics.get_hits.inc();
        } else {
            self.metrics.get_misses.inc();
        }
        Ok(result)
    }

    /// Increment a decimal counter, returning the new value
    pub fn increment(&self, key: &str, amount: u64) -> Result<u64> {
        self.metrics.cmd_incr.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept
            .execute("increment", || self.backend.increment(key, amount))
    }

    /// Decrement a decimal counter, returning the new value
    ///
    /// Decrementing below zero stops at zero.
    pub fn decrement(&self, key: &str, amount: u64) -> Result<u64> {
        self.metrics.cmd_decr.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept
            .execute("decrement", || self.backend.decrement(key, amount))
    }

    /// Store unconditionally
    pub fn set(&self, key: &str, value: impl Into<CacheValue>, expiry: Expiry) -> Result<bool> {
        self.metrics.cmd_set.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let value = value.into();
        self.intercept
            .execute("set", || self.backend.store(StoreMode::Set, key, &value, expiry))
    }

    /// Serialize and store unconditionally
    pub fn set_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry: Expiry,
    ) -> Result<bool> {
        let data = serde_json::to_vec(value).map_err(|e| StoaCacheError::Encoding(e.to_string()))?;
        self.set(key, data, expiry)
    }

    /// Store only if the key is absent
    pub fn add(&self, key: &str, value: impl Into<CacheValue>, expiry: Expiry) -> Result<bool> {
        self.metrics.cmd_add.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let value = value.into();
        self.intercept
            .execute("add", || self.backend.store(StoreMode::Add, key, &value, expiry))
    }

    /// Store only if the key is present
    pub fn replace(&self, key: &str, value: impl Into<CacheValue>, expiry: Expiry) -> Result<bool> {
        self.metrics.cmd_replace.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let value = value.into();
        self.intercept.execute("replace", || {
            self.backend.store(StoreMode::Replace, key, &value, expiry)
        })
    }

    /// Concatenate raw bytes after an existing value
    pub fn append(&self, key: &str, data: &[u8]) -> Result<bool> {
        self.metrics.cmd_append.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept.execute("append", || self.backend.append(key, data))
    }

    /// Concatenate raw bytes before an existing value
    pub fn prepend(&self, key: &str, data: &[u8]) -> Result<bool> {
        self.metrics.cmd_prepend.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept.execute("prepend", || self.backend.prepend(key, data))
    }

    /// Store only if the entry's version still matches `token`
    ///
    /// Returns `false` on a version mismatch, leaving the stored value
    /// unchanged.
    pub fn compare_and_swap(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        expiry: Expiry,
        token: CasToken,
    ) -> Result<bool> {
        self.metrics.cmd_cas.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let value = value.into();
        self.intercept.execute("compare_and_swap", || {
            self.backend.check_and_swap(key, &value, expiry, token)
        })
    }

    /// Serialize and store only if the entry's version still matches
    pub fn compare_and_swap_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry: Expiry,
        token: CasToken,
    ) -> Result<bool> {
        let data = serde_json::to_vec(value).map_err(|e| StoaCacheError::Encoding(e.to_string()))?;
        self.compare_and_swap(key, data, expiry, token)
    }

    /// Update the expiry of an existing entry
    pub fn touch(&self, key: &str, expiry: Expiry) -> Result<bool> {
        self.metrics.cmd_touch.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept.execute("touch", || self.backend.touch(key, expiry))
    }

    /// Clear the entire cache
    pub fn flush(&self) -> Result<()> {
        self.metrics.cmd_flush.inc();
        let _timer = self.metrics.op_latency.start_timer();
        self.intercept.execute("flush", || self.backend.flush())
    }

    /// Fetch many values; keys not found are absent from the map
    pub fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, CacheValue>> {
        self.metrics.cmd_get_many.inc();
        let _timer = self.metrics.op_latency.start_timer();
        let result = self
            .intercept
            .execute("get_many", || self.backend.fetch_many(keys))?;
        let hits = result.len() as u64;
        self.metrics.get_hits.inc_by(hits);
        self.metrics
            .get_misses
            .inc_by((keys.len() as u64).saturating_sub(hits));
        Ok(result)
    }

    /// Fetch many values plus an out-of-band map of version tokens
    ///
    /// Unlike every other operation, this one calls the backend directly:
    /// the secondary token map cannot flow through the interception
    /// wrapper's single return channel. Its failures therefore propagate
    /// raw and unlogged, regardless of the configured [`FailureMode`].
    #[allow(clippy::type_complexity)]
    pub fn get_many_with_cas(
        &self,
        keys: &[&str],
    ) -> Result<(HashMap<String, CacheValue>, HashMap<String, CasToken>)> {
        self.metrics.cmd_get_many.inc();
        let _timer = self.metrics.op_latency.start_timer();
        Ok(self.backend.fetch_many_with_tokens(keys)?)
    }

    /// Release the backend's resources; safe to call more than once
    pub fn dispose(&self) -> Result<()> {
        self.intercept.execute("dispose", || self.backend.dispose())
    }
}

impl fmt::Debug for StoaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoaCache")
            .field("backend", &self.backend)
            .field("mode", &self.intercept.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde::Deserialize;

    fn cache() -> StoaCache {
        StoaCache::with_backend(Arc::new(MemoryBackend::new()), FailureMode::Propagate)
    }

    /// A facade over a disposed backend: every call fails
    fn broken_cache(on_error: FailureMode) -> StoaCache {
        let backend = MemoryBackend::new();
        backend.dispose().unwrap();
        StoaCache::with_backend(Arc::new(backend), on_error)
    }

    #[test]
    fn test_construction_rejects_bad_host() {
        assert!(StoaCache::from_hosts(&["10.0.0.1:11211", "bogus"]).is_err());
    }

    #[test]
    fn test_construction_rejects_empty_endpoints() {
        assert!(matches!(
            StoaCache::from_endpoints(vec![]),
            Err(StoaCacheError::Config(ConfigError::NoServers))
        ));
    }

    #[test]
    fn test_set_get_remove() {
        let cache = cache();
        assert!(cache.set("key", "value", Expiry::Never).unwrap());
        assert_eq!(cache.get("key").unwrap().unwrap().as_bytes(), b"value");

        assert!(cache.remove("key").unwrap());
        assert!(!cache.remove("key").unwrap());
        assert!(cache.get("key").unwrap().is_none());
    }

    #[test]
    fn test_add_and_replace_conditions() {
        let cache = cache();
        assert!(cache.add("key", "v1", Expiry::Never).unwrap());
        assert!(!cache.add("key", "v2", Expiry::Never).unwrap());
        assert_eq!(cache.get("key").unwrap().unwrap().as_bytes(), b"v1");

        assert!(!cache.replace("missing", "v", Expiry::Never).unwrap());
        assert!(cache.replace("key", "v2", Expiry::Never).unwrap());

        // set is unconditional either way
        assert!(cache.set("key", "v3", Expiry::Never).unwrap());
        assert!(cache.set("brand_new", "v", Expiry::Never).unwrap());
    }

    #[test]
    fn test_compare_and_swap() {
        let cache = cache();
        cache.set("key", "v1", Expiry::Never).unwrap();
        let (_, token) = cache.get_with_cas("key").unwrap().unwrap();

        cache.set("key", "v2", Expiry::Never).unwrap();
        assert!(!cache.compare_and_swap("key", "v3", Expiry::Never, token).unwrap());
        assert_eq!(cache.get("key").unwrap().unwrap().as_bytes(), b"v2");

        let (_, token) = cache.get_with_cas("key").unwrap().unwrap();
        assert!(cache.compare_and_swap("key", "v3", Expiry::Never, token).unwrap());
        assert_eq!(cache.get("key").unwrap().unwrap().as_bytes(), b"v3");
    }

    #[test]
    fn test_counters() {
        let cache = cache();
        cache.set("counter", "10", Expiry::Never).unwrap();
        assert_eq!(cache.increment("counter", 5).unwrap(), 15);
        assert_eq!(cache.decrement("counter", 20).unwrap(), 0);
    }

    #[test]
    fn test_append_prepend() {
        let cache = cache();
        cache.set("key", "mid", Expiry::Never).unwrap();
        assert!(cache.append("key", b"-b").unwrap());
        assert!(cache.prepend("key", b"a-").unwrap());
        assert_eq!(cache.get("key").unwrap().unwrap().as_bytes(), b"a-mid-b");
    }

    #[test]
    fn test_get_many_omits_absent() {
        let cache = cache();
        cache.set("present", "1", Expiry::Never).unwrap();

        let result = cache.get_many(&["present", "absent"]).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.contains_key("present"));
    }

    #[test]
    fn test_get_many_with_cas_tokens_work() {
        let cache = cache();
        cache.set("a", "1", Expiry::Never).unwrap();
        cache.set("b", "2", Expiry::Never).unwrap();

        let (values, tokens) = cache.get_many_with_cas(&["a", "b", "c"]).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(tokens.len(), 2);
        assert!(cache.compare_and_swap("a", "1x", Expiry::Never, tokens["a"]).unwrap());
    }

    #[test]
    fn test_flush_then_get_is_absent() {
        let cache = cache();
        cache.set("key", "value", Expiry::Never).unwrap();
        cache.flush().unwrap();
        assert!(cache.get("key").unwrap().is_none());
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Session {
            user: String,
            visits: u32,
        }

        let cache = cache();
        let session = Session {
            user: "ada".to_string(),
            visits: 3,
        };
        assert!(cache.set_as("session", &session, Expiry::Never).unwrap());
        assert_eq!(cache.get_as::<Session>("session").unwrap().unwrap(), session);
        assert_eq!(cache.get_as::<Session>("missing").unwrap(), None);
    }

    #[test]
    fn test_typed_decode_failure() {
        let cache = cache();
        cache.set("key", "not json", Expiry::Never).unwrap();
        assert!(matches!(
            cache.get_as::<u64>("key"),
            Err(StoaCacheError::Decoding(_))
        ));
    }

    #[test]
    fn test_suppress_mode_swallows_backend_failures() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
            .try_init();

        let cache = broken_cache(FailureMode::Suppress);
        assert_eq!(cache.get("key").unwrap(), None);
        assert!(!cache.set("key", "v", Expiry::Never).unwrap());
        assert_eq!(cache.increment("key", 1).unwrap(), 0);
        assert!(cache.get_many(&["a"]).unwrap().is_empty());
        assert!(cache.flush().is_ok());

        assert_eq!(cache.metrics().suppressed_errors.get(), 5);
    }

    #[test]
    fn test_propagate_mode_surfaces_backend_failures() {
        let cache = broken_cache(FailureMode::Propagate);
        assert!(cache.get("key").is_err());
        assert!(cache.set("key", "v", Expiry::Never).is_err());
        assert_eq!(cache.metrics().backend_errors.get(), 2);
    }

    #[test]
    fn test_bulk_cas_bypasses_interception() {
        // Even in suppress mode the CAS-bearing bulk get propagates raw
        let cache = broken_cache(FailureMode::Suppress);
        assert!(cache.get_many_with_cas(&["a"]).is_err());
        // And the shared wrapper never saw it
        assert_eq!(cache.metrics().backend_errors.get(), 0);
        assert_eq!(cache.metrics().suppressed_errors.get(), 0);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let cache = cache();
        cache.set("key", "v", Expiry::Never).unwrap();
        cache.dispose().unwrap();
        cache.dispose().unwrap();
        assert!(cache.get("key").is_err());
    }

    #[test]
    fn test_operation_metrics() {
        let cache = cache();
        cache.set("key", "v", Expiry::Never).unwrap();
        cache.get("key").unwrap();
        cache.get("missing").unwrap();
        cache.get_many(&["key", "missing"]).unwrap();

        let metrics = cache.metrics();
        assert_eq!(metrics.cmd_set.get(), 1);
        assert_eq!(metrics.cmd_get.get(), 2);
        assert_eq!(metrics.cmd_get_many.get(), 1);
        assert_eq!(metrics.get_hits.get(), 2);
        assert_eq!(metrics.get_misses.get(), 2);
    }
}
