use serde::{Deserialize, Serialize};

/// Inbound DNS listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_dns_port")]
    pub dns_port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Offer recursion (forward cache misses upstream). When disabled only
    /// cached answers are served and misses are REFUSED.
    #[serde(default = "default_true")]
    pub recursion_available: bool,

    /// Largest UDP response we send, even if the client advertises more via EDNS
    #[serde(default = "default_max_udp_payload")]
    pub max_udp_payload: u16,

    /// Number of query contexts kept warm in the pool
    #[serde(default = "default_context_pool_size")]
    pub context_pool_size: usize,

    #[serde(default = "default_tcp_idle_timeout")]
    pub tcp_idle_timeout_secs: u64,
}

fn default_dns_port() -> u16 {
    53
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_udp_payload() -> u16 {
    1232
}

fn default_context_pool_size() -> usize {
    256
}

fn default_tcp_idle_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            dns_port: default_dns_port(),
            bind_address: default_bind_address(),
            recursion_available: true,
            max_udp_payload: default_max_udp_payload(),
            context_pool_size: default_context_pool_size(),
            tcp_idle_timeout_secs: default_tcp_idle_timeout(),
        }
    }
}
