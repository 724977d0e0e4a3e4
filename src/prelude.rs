//! Prelude module for common imports.
//!
//! This module re-exports commonly used types and traits for convenience.
//!
//! # Usage
//!
//! ```ignore
//! use stoacache::prelude::*;
//! ```

// Error types
pub use crate::error::{BackendError, ConfigError, Result, StoaCacheError};

// Configuration
pub use crate::config::{Endpoint, PoolConfig};

// Values
pub use crate::value::{CacheValue, CasToken, Expiry};

// Backends
pub use crate::backend::{CacheBackend, MemcachedBackend, MemoryBackend, StoreMode};

// Interception
pub use crate::intercept::{FailureMode, Interceptor};

// Metrics
pub use crate::metrics::Metrics;

// Facade
pub use crate::facade::StoaCache;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
