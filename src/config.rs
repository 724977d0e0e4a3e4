//! Configuration for stoacache
//!
//! An [`Endpoint`] identifies one backend cache server instance. A
//! [`PoolConfig`] carries the endpoint list together with the pool sizing
//! and timeout settings handed to the wrapped client.

use crate::error::ConfigError;
use crate::intercept::FailureMode;
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// One backend cache server (address/port pair)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: IpAddr,
    port: u16,
}

impl Endpoint {
    /// Port used when an endpoint string carries none
    pub const DEFAULT_PORT: u16 = 11211;

    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self { addr, port }
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ConfigError;

    /// Parse `"address[:port]"`.
    ///
    /// The address must be an IP literal. At most one colon is accepted,
    /// so bare IPv6 literals are rejected rather than misread.
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let mut parts = s.split(':');
        let host = parts.next().unwrap_or("");
        let port = match parts.next() {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(p.to_string()))?,
            None => Self::DEFAULT_PORT,
        };
        if parts.next().is_some() {
            return Err(ConfigError::MalformedEndpoint(s.to_string()));
        }

        let addr = host
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidAddress(host.to_string()))?;

        Ok(Self { addr, port })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

/// Connection pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Cache servers as `"address[:port]"` strings
    pub servers: Vec<String>,

    /// Idle connections kept per server
    pub min_idle_conns: u32,

    /// Maximum pooled connections per server
    pub max_pool_size: u32,

    /// Timeout for acquiring a connection, in seconds
    pub connect_timeout_secs: u64,

    /// How long a backend server stays marked unreachable before being
    /// retried, in seconds (honored only where the wrapped client supports it)
    pub dead_timeout_secs: u64,

    /// What to do when the wrapped client fails an operation
    pub on_error: FailureMode,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            servers: vec!["127.0.0.1:11211".to_string()],
            min_idle_conns: 10,
            max_pool_size: 100,
            connect_timeout_secs: 10,
            dead_timeout_secs: 120,
            on_error: FailureMode::Propagate,
        }
    }
}

impl PoolConfig {
    /// Parse the configured server list into endpoints
    ///
    /// An empty list fails; so does any malformed entry.
    pub fn endpoints(&self) -> Result<Vec<Endpoint>, ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        self.servers.iter().map(|s| s.parse()).collect()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn dead_timeout(&self) -> Duration {
        Duration::from_secs(self.dead_timeout_secs)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        Ok(toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?)
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(servers) = std::env::var("STOACACHE_SERVERS") {
            config.servers = servers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(v) = std::env::var("STOACACHE_MIN_IDLE_CONNS")
            && let Ok(n) = v.parse()
        {
            config.min_idle_conns = n;
        }

        if let Ok(v) = std::env::var("STOACACHE_MAX_POOL_SIZE")
            && let Ok(n) = v.parse()
        {
            config.max_pool_size = n;
        }

        if let Ok(v) = std::env::var("STOACACHE_CONNECT_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.connect_timeout_secs = n;
        }

        if let Ok(v) = std::env::var("STOACACHE_DEAD_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            config.dead_timeout_secs = n;
        }

        if let Ok(v) = std::env::var("STOACACHE_ON_ERROR") {
            if v.eq_ignore_ascii_case("suppress") {
                config.on_error = FailureMode::Suppress;
            } else if v.eq_ignore_ascii_case("propagate") {
                config.on_error = FailureMode::Propagate;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_port() {
        let ep: Endpoint = "10.0.0.1:11222".parse().unwrap();
        assert_eq!(ep.addr(), "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(ep.port(), 11222);
    }

    #[test]
    fn test_parse_default_port() {
        let ep: Endpoint = "192.168.1.5".parse().unwrap();
        assert_eq!(ep.port(), Endpoint::DEFAULT_PORT);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!("".parse::<Endpoint>(), Err(ConfigError::EmptyEndpoint));
        assert_eq!("   ".parse::<Endpoint>(), Err(ConfigError::EmptyEndpoint));
    }

    #[test]
    fn test_parse_invalid_address() {
        assert!(matches!(
            "not-an-ip:11211".parse::<Endpoint>(),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            ":11211".parse::<Endpoint>(),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_invalid_port() {
        assert!(matches!(
            "10.0.0.1:notaport".parse::<Endpoint>(),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            "10.0.0.1:70000".parse::<Endpoint>(),
            Err(ConfigError::InvalidPort(_))
        ));
        assert!(matches!(
            "10.0.0.1:".parse::<Endpoint>(),
            Err(ConfigError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_parse_multiple_colons() {
        assert!(matches!(
            "10.0.0.1:11211:extra".parse::<Endpoint>(),
            Err(ConfigError::MalformedEndpoint(_))
        ));
        // IPv6 literals hit the same single-colon contract
        assert!("::1".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let ep: Endpoint = "10.1.2.3:5000".parse().unwrap();
        assert_eq!(ep.to_string(), "10.1.2.3:5000");
        assert_eq!(ep.to_string().parse::<Endpoint>().unwrap(), ep);
    }

    #[test]
    fn test_pool_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.min_idle_conns, 10);
        assert_eq!(config.max_pool_size, 100);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.dead_timeout(), Duration::from_secs(120));
        assert_eq!(config.on_error, FailureMode::Propagate);
    }

    #[test]
    fn test_pool_config_no_servers() {
        let config = PoolConfig {
            servers: vec![],
            ..Default::default()
        };
        assert_eq!(config.endpoints(), Err(ConfigError::NoServers));
    }

    #[test]
    fn test_pool_config_endpoints() {
        let config = PoolConfig {
            servers: vec!["10.0.0.1".to_string(), "10.0.0.2:11300".to_string()],
            ..Default::default()
        };
        let endpoints = config.endpoints().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].port(), 11211);
        assert_eq!(endpoints[1].port(), 11300);
    }

    #[test]
    fn test_pool_config_bad_server_entry() {
        let config = PoolConfig {
            servers: vec!["10.0.0.1".to_string(), "bogus".to_string()],
            ..Default::default()
        };
        assert!(config.endpoints().is_err());
    }

    #[test]
    fn test_pool_config_from_toml() {
        let config: PoolConfig = toml::from_str(
            r#"
            servers = ["10.0.0.1:11211", "10.0.0.2:11211"]
            max_pool_size = 25
            on_error = "suppress"
            "#,
        )
        .unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.max_pool_size, 25);
        assert_eq!(config.min_idle_conns, 10);
        assert_eq!(config.on_error, FailureMode::Suppress);
    }
}
