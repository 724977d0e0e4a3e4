//! # stoacache
//!
//! Memcached client facade with endpoint pooling and uniform failure
//! interception.
//!
//! *Stoa* (στοά) means "portico" in Greek - a front that stands before the
//! cache servers behind it.
//!
//! ## Features
//!
//! - Full memcached operation set (get, set, add, replace, append/prepend,
//!   increment/decrement, compare-and-swap, bulk get, touch, flush)
//! - `"address[:port]"` endpoint parsing with pooled connections handled by
//!   the wrapped `memcache` client
//! - Uniform failure interception with a configurable propagate-or-suppress
//!   policy
//! - Backend trait seam with an in-process implementation for hermetic tests
//! - Prometheus metrics for every operation
//!
//! ## Example
//!
//! ```ignore
//! use stoacache::StoaCache;
//! use stoacache::value::Expiry;
//!
//! let cache = StoaCache::from_hosts(&["10.0.0.1:11211", "10.0.0.2"])?;
//! cache.set("greeting", "hello", Expiry::seconds(60))?;
//! let value = cache.get("greeting")?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────────┐     ┌──────────────┐
//! │ application  │────▶│ StoaCache                │────▶│ memcached    │
//! │              │     │  ├─ endpoint resolution  │     │ servers      │
//! │              │     │  ├─ failure interception │     │ (pooling and │
//! │              │     │  └─ metrics/logging      │     │  hashing in  │
//! └──────────────┘     └──────────────────────────┘     │  the client) │
//!                                                       └──────────────┘
//! ```

// Modules
pub mod backend;
pub mod config;
pub mod error;
pub mod facade;
pub mod intercept;
pub mod metrics;
pub mod prelude;
pub mod value;

// Re-exports for convenience
pub use error::{BackendError, ConfigError, Result, StoaCacheError};
pub use facade::StoaCache;
