//! Cache entry types
//!
//! Expiry rules (memcached-compatible):
//! - 0 = never expire
//! - <= 2592000 (30 days) = relative seconds from now
//! - > 2592000 = absolute Unix timestamp

use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Maximum relative TTL value (30 days in seconds)
const MAX_RELATIVE_TTL: u64 = 2592000;

/// Opaque cache payload with memcached flags
///
/// The facade never interprets the payload; it is carried as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue {
    /// Actual data
    pub data: Bytes,
    /// Memcached flags
    pub flags: u32,
}

impl CacheValue {
    pub fn new(data: impl Into<Bytes>, flags: u32) -> Self {
        Self {
            data: data.into(),
            flags,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Bytes> for CacheValue {
    fn from(data: Bytes) -> Self {
        Self { data, flags: 0 }
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: Bytes::from(data),
            flags: 0,
        }
    }
}

impl From<&[u8]> for CacheValue {
    fn from(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            flags: 0,
        }
    }
}

impl From<String> for CacheValue {
    fn from(data: String) -> Self {
        Self {
            data: Bytes::from(data),
            flags: 0,
        }
    }
}

impl From<&str> for CacheValue {
    fn from(data: &str) -> Self {
        Self {
            data: Bytes::copy_from_slice(data.as_bytes()),
            flags: 0,
        }
    }
}

/// Entry expiration: never, relative to now, or at an absolute time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Entry never expires
    #[default]
    Never,
    /// Expire this long after the write
    Relative(Duration),
    /// Expire at an absolute point in time
    At(SystemTime),
}

impl Expiry {
    pub fn seconds(secs: u64) -> Self {
        Self::Relative(Duration::from_secs(secs))
    }

    /// Encode as a memcached `exptime` argument
    ///
    /// Relative durations beyond 30 days must be sent as absolute
    /// timestamps or the server would misread them.
    pub fn as_exptime(&self) -> u32 {
        match self {
            Self::Never => 0,
            Self::Relative(d) => {
                let secs = d.as_secs();
                if secs == 0 {
                    0
                } else if secs <= MAX_RELATIVE_TTL {
                    secs as u32
                } else {
                    clamp_u32(unix_timestamp().saturating_add(secs))
                }
            }
            Self::At(t) => clamp_u32(to_unix(*t)),
        }
    }

    /// Absolute expiration timestamp in Unix seconds (0 = never expire)
    pub fn expire_at(&self) -> u64 {
        match self {
            Self::Never => 0,
            Self::Relative(d) => {
                let secs = d.as_secs();
                if secs == 0 {
                    0
                } else {
                    unix_timestamp().saturating_add(secs)
                }
            }
            Self::At(t) => to_unix(*t),
        }
    }
}

/// Opaque 64-bit version marker returned by a CAS-bearing read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CasToken(u64);

impl CasToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Get the current Unix timestamp
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn to_unix(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn clamp_u32(v: u64) -> u32 {
    v.min(u64::from(u32::MAX)) as u32
}
