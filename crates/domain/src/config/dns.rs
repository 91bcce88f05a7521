use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Upstream resolution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DnsConfig {
    /// Upstream nameservers as `ip[:port]` (port defaults to 53)
    #[serde(default = "default_upstream_servers")]
    pub upstream_servers: Vec<String>,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,

    /// Attempts after the first one before a question fails with TIMEOUT
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Skip UDP and always query upstreams over TCP
    #[serde(default = "default_false")]
    pub always_tcp: bool,

    /// TTL in seconds for answers without records (NXDOMAIN / NODATA)
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl: u32,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Upper bound applied to record TTLs when caching
    #[serde(default = "default_cache_max_ttl")]
    pub cache_max_ttl: u32,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            upstream_servers: default_upstream_servers(),
            query_timeout: default_query_timeout(),
            retries: default_retries(),
            always_tcp: false,
            negative_ttl: default_negative_ttl(),
            cache_max_entries: default_cache_max_entries(),
            cache_max_ttl: default_cache_max_ttl(),
        }
    }
}

// Default functions for DNS config
fn default_upstream_servers() -> Vec<String> {
    vec!["8.8.8.8:53".to_string(), "1.1.1.1:53".to_string()]
}

fn default_query_timeout() -> u64 {
    2000
}

fn default_retries() -> u32 {
    2
}

fn default_false() -> bool {
    false
}

fn default_negative_ttl() -> u32 {
    300
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_cache_max_ttl() -> u32 {
    86_400
}

impl DnsConfig {
    /// Parse `upstream_servers`, filling in port 53 where omitted.
    pub fn upstream_addrs(&self) -> Result<Vec<SocketAddr>, ConfigError> {
        self.upstream_servers
            .iter()
            .map(|s| parse_upstream(s))
            .collect()
    }
}

fn parse_upstream(server: &str) -> Result<SocketAddr, ConfigError> {
    let server = server.trim();
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    server
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(|_| ConfigError::Validation(format!("invalid upstream server '{server}'")))
}
