//! Pooled memcached backend
//!
//! Thin adapter over the `memcache` crate, which owns connection pooling,
//! dead-server handling, consistent hashing and the binary wire protocol.
//! This layer only builds the pool from the endpoint list and maps
//! conflict outcomes onto the boolean store contract.

use crate::backend::{CacheBackend, StoreMode};
use crate::config::{Endpoint, PoolConfig};
use crate::error::BackendError;
use crate::value::{CacheValue, CasToken, Expiry};
use memcache::{Client, CommandError, MemcacheError, ToMemcacheValue};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use tracing::{debug, info};

impl<W: Write> ToMemcacheValue<W> for &CacheValue {
    fn get_flags(&self) -> u32 {
        self.flags
    }

    fn get_length(&self) -> usize {
        self.data.len()
    }

    fn write_to(&self, stream: &mut W) -> std::io::Result<()> {
        stream.write_all(&self.data)
    }
}

/// Cache backend delegating to a pooled `memcache::Client`
pub struct MemcachedBackend {
    /// Pool handle; emptied on dispose
    client: RwLock<Option<Client>>,
    servers: Vec<Endpoint>,
}

impl MemcachedBackend {
    /// Build the pooled client from an endpoint list
    pub fn connect(endpoints: &[Endpoint], config: &PoolConfig) -> Result<Self, BackendError> {
        let mut builder = Client::builder();
        for endpoint in endpoints {
            builder = builder.add_server(server_url(endpoint))?;
        }
        let client = builder
            .with_min_idle_conns(config.min_idle_conns)
            .with_max_pool_size(config.max_pool_size)
            .with_connection_timeout(config.connect_timeout())
            .build()?;

        info!(
            servers = endpoints.len(),
            min_idle_conns = config.min_idle_conns,
            max_pool_size = config.max_pool_size,
            dead_timeout_secs = config.dead_timeout_secs,
            "memcached pool ready"
        );

        Ok(Self {
            client: RwLock::new(Some(client)),
            servers: endpoints.to_vec(),
        })
    }

    pub fn servers(&self) -> &[Endpoint] {
        &self.servers
    }

    fn handle(&self) -> Result<Client, BackendError> {
        let guard = self.client.read();
        match &*guard {
            Some(client) => Ok(client.clone()),
            None => Err(BackendError::Disposed),
        }
    }
}

fn server_url(endpoint: &Endpoint) -> String {
    format!("memcache://{}:{}", endpoint.addr(), endpoint.port())
}

impl CacheBackend for MemcachedBackend {
    fn store(
        &self,
        mode: StoreMode,
        key: &str,
        value: &CacheValue,
        expiry: Expiry,
    ) -> Result<bool, BackendError> {
        let client = self.handle()?;
        let exptime = expiry.as_exptime();
        let result = match mode {
            StoreMode::Set => client.set(key, value, exptime),
            StoreMode::Add => client.add(key, value, exptime),
            StoreMode::Replace => client.replace(key, value, exptime),
        };
        match result {
            Ok(()) => Ok(true),
            // The server reports a failed conditional store as a command
            // error; the facade contract is a boolean
            Err(MemcacheError::CommandError(
                CommandError::KeyExists | CommandError::KeyNotFound,
            )) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn check_and_swap(
        &self,
        key: &str,
        value: &CacheValue,
        expiry: Expiry,
        token: CasToken,
    ) -> Result<bool, BackendError> {
        let client = self.handle()?;
        match client.cas(key, value, expiry.as_exptime(), token.value()) {
            Ok(swapped) => Ok(swapped),
            Err(MemcacheError::CommandError(
                CommandError::KeyExists | CommandError::KeyNotFound,
            )) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn append(&self, key: &str, data: &[u8]) -> Result<bool, BackendError> {
        let client = self.handle()?;
        let value = CacheValue::from(data);
        match client.append(key, &value) {
            Ok(()) => Ok(true),
            Err(MemcacheError::CommandError(
                CommandError::KeyExists | CommandError::KeyNotFound,
            )) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn prepend(&self, key: &str, data: &[u8]) -> Result<bool, BackendError> {
        let client = self.handle()?;
        let value = CacheValue::from(data);
        match client.prepend(key, &value) {
            Ok(()) => Ok(true),
            Err(MemcacheError::CommandError(
                CommandError::KeyExists | CommandError::KeyNotFound,
            )) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch(&self, key: &str) -> Result<Option<CacheValue>, BackendError> {
        let client = self.handle()?;
        let result: Option<(Vec<u8>, u32, Option<u64>)> = client.get(key)?;
        Ok(result.map(|(data, flags, _)| CacheValue::new(data, flags)))
    }

    fn fetch_with_token(
        &self,
        key: &str,
    ) -> Result<Option<(CacheValue, CasToken)>, BackendError> {
        let client = self.handle()?;
        let result: Option<(Vec<u8>, u32, Option<u64>)> = client.get(key)?;
        Ok(result.map(|(data, flags, cas)| {
            (CacheValue::new(data, flags), CasToken::new(cas.unwrap_or(0)))
        }))
    }

    fn fetch_many(&self, keys: &[&str]) -> Result<HashMap<String, CacheValue>, BackendError> {
        let client = self.handle()?;
        let result: HashMap<String, (Vec<u8>, u32, Option<u64>)> = client.gets(keys)?;
        Ok(result
            .into_iter()
            .map(|(key, (data, flags, _))| (key, CacheValue::new(data, flags)))
            .collect())
    }

    fn fetch_many_with_tokens(
        &self,
        keys: &[&str],
    ) -> Result<(HashMap<String, CacheValue>, HashMap<String, CasToken>), BackendError> {
        let client = self.handle()?;
        let result: HashMap<String, (Vec<u8>, u32, Option<u64>)> = client.gets(keys)?;
        let mut values = HashMap::with_capacity(result.len());
        let mut tokens = HashMap::with_capacity(result.len());
        for (key, (data, flags, cas)) in result {
            tokens.insert(key.clone(), CasToken::new(cas.unwrap_or(0)));
            values.insert(key, CacheValue::new(data, flags));
        }
        Ok((values, tokens))
    }

    fn increment(&self, key: &str, amount: u64) -> Result<u64, BackendError> {
        let client = self.handle()?;
        match client.increment(key, amount) {
            Ok(value) => Ok(value),
            Err(MemcacheError::CommandError(CommandError::KeyNotFound)) => {
                Err(BackendError::KeyNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn decrement(&self, key: &str, amount: u64) -> Result<u64, BackendError> {
        let client = self.handle()?;
        match client.decrement(key, amount) {
            Ok(value) => Ok(value),
            Err(MemcacheError::CommandError(CommandError::KeyNotFound)) => {
                Err(BackendError::KeyNotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn touch(&self, key: &str, expiry: Expiry) -> Result<bool, BackendError> {
        let client = self.handle()?;
        match client.touch(key, expiry.as_exptime()) {
            Ok(touched) => Ok(touched),
            Err(MemcacheError::CommandError(CommandError::KeyNotFound)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<bool, BackendError> {
        let client = self.handle()?;
        match client.delete(key) {
            Ok(removed) => Ok(removed),
            Err(MemcacheError::CommandError(CommandError::KeyNotFound)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&self) -> Result<(), BackendError> {
        let client = self.handle()?;
        client.flush()?;
        Ok(())
    }

    fn dispose(&self) -> Result<(), BackendError> {
        if let Some(client) = self.client.write().take() {
            drop(client);
            debug!("memcached pool released");
        }
        Ok(())
    }
}

impl fmt::Debug for MemcachedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedBackend")
            .field("servers", &self.servers)
            .field("disposed", &self.client.read().is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_url() {
        let endpoint: Endpoint = "10.0.0.1:11300".parse().unwrap();
        assert_eq!(server_url(&endpoint), "memcache://10.0.0.1:11300");

        let endpoint: Endpoint = "127.0.0.1".parse().unwrap();
        assert_eq!(server_url(&endpoint), "memcache://127.0.0.1:11211");
    }

    // The tests below require a memcached server on 127.0.0.1:11211
    // (e.g. `docker run -p 11211:11211 memcached`).

    fn live_backend() -> MemcachedBackend {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .try_init();
        let config = PoolConfig::default();
        let endpoints = config.endpoints().unwrap();
        MemcachedBackend::connect(&endpoints, &config).unwrap()
    }

    #[test]
    #[ignore] // Requires memcached server
    fn test_live_basic_operations() {
        let backend = live_backend();
        backend.flush().unwrap();

        let value = CacheValue::new(b"hello".to_vec(), 7);
        assert!(backend.store(StoreMode::Set, "stoacache_test", &value, Expiry::Never).unwrap());

        let fetched = backend.fetch("stoacache_test").unwrap().unwrap();
        assert_eq!(fetched.as_bytes(), b"hello");
        assert_eq!(fetched.flags, 7);

        assert!(backend.remove("stoacache_test").unwrap());
        assert!(backend.fetch("stoacache_test").unwrap().is_none());
    }

    #[test]
    #[ignore] // Requires memcached server
    fn test_live_conditional_stores() {
        let backend = live_backend();
        backend.flush().unwrap();

        let v1 = CacheValue::from("v1");
        let v2 = CacheValue::from("v2");
        assert!(backend.store(StoreMode::Add, "stoacache_cond", &v1, Expiry::Never).unwrap());
        assert!(!backend.store(StoreMode::Add, "stoacache_cond", &v2, Expiry::Never).unwrap());
        assert!(backend.store(StoreMode::Replace, "stoacache_cond", &v2, Expiry::Never).unwrap());
        assert!(!backend
            .store(StoreMode::Replace, "stoacache_missing", &v2, Expiry::Never)
            .unwrap());
    }

    #[test]
    #[ignore] // Requires memcached server
    fn test_live_cas_round_trip() {
        let backend = live_backend();
        backend.flush().unwrap();

        let v1 = CacheValue::from("v1");
        backend.store(StoreMode::Set, "stoacache_cas", &v1, Expiry::Never).unwrap();
        let (_, token) = backend.fetch_with_token("stoacache_cas").unwrap().unwrap();

        let v2 = CacheValue::from("v2");
        assert!(backend.check_and_swap("stoacache_cas", &v2, Expiry::Never, token).unwrap());
        // Stale now
        assert!(!backend.check_and_swap("stoacache_cas", &v1, Expiry::Never, token).unwrap());
    }
}
