//! Uniform failure interception
//!
//! Every facade operation funnels its backend call through
//! [`Interceptor::execute`], which logs failures and applies the configured
//! [`FailureMode`]: rethrow the error, or swallow it and hand the caller the
//! operation's neutral default (`None`, `false`, `0`, an empty map).

use crate::error::{BackendError, Result};
use crate::metrics::Metrics;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

/// What to do when the wrapped client fails an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Surface backend failures to the caller
    #[default]
    Propagate,
    /// Log the failure and return the operation's neutral default
    Suppress,
}

/// The single interception point for backend failures
#[derive(Clone)]
pub struct Interceptor {
    mode: FailureMode,
    metrics: Arc<Metrics>,
}

impl Interceptor {
    pub fn new(mode: FailureMode, metrics: Arc<Metrics>) -> Self {
        Self { mode, metrics }
    }

    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    /// Run one backend operation under the interception policy
    pub fn execute<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Default,
        F: FnOnce() -> std::result::Result<T, BackendError>,
    {
        match f() {
            Ok(value) => Ok(value),
            Err(e) => {
                self.metrics.backend_errors.inc();
                match self.mode {
                    FailureMode::Propagate => {
                        error!(op, error = %e, "cache operation failed");
                        Err(e.into())
                    }
                    FailureMode::Suppress => {
                        warn!(op, error = %e, "cache operation failed, returning default");
                        self.metrics.suppressed_errors.inc();
                        Ok(T::default())
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("mode", &self.mode)
            .finish()
    }
}
