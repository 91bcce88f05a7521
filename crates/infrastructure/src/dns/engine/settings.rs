use relaydns_domain::config::{ConfigError, DnsConfig};
use std::net::SocketAddr;
use std::time::Duration;

/// Runtime settings of a [`ResolverEngine`](super::ResolverEngine).
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub servers: Vec<SocketAddr>,
    pub always_tcp: bool,
    /// Further attempts after the first one.
    pub retries: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub negative_ttl: u32,
    pub cache_max_entries: usize,
    pub max_ttl: u32,
}

impl ResolverSettings {
    pub fn from_config(config: &DnsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            servers: config.upstream_addrs()?,
            always_tcp: config.always_tcp,
            retries: config.retries,
            timeout: Duration::from_millis(config.query_timeout),
            negative_ttl: config.negative_ttl,
            cache_max_entries: config.cache_max_entries,
            max_ttl: config.cache_max_ttl,
        })
    }

    /// Defaults against a single upstream.
    pub fn with_server(server: SocketAddr) -> Self {
        Self {
            servers: vec![server],
            ..Self::default()
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let config = DnsConfig::default();
        Self {
            servers: Vec::new(),
            always_tcp: config.always_tcp,
            retries: config.retries,
            timeout: Duration::from_millis(config.query_timeout),
            negative_ttl: config.negative_ttl,
            cache_max_entries: config.cache_max_entries,
            max_ttl: config.cache_max_ttl,
        }
    }
}
