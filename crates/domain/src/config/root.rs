use super::{ConfigError, DnsConfig, LoggingConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub dns: DnsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values given on the command line; they win over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub dns_port: Option<u16>,
    pub bind_address: Option<String>,
    pub upstream_servers: Option<Vec<String>>,
    pub log_level: Option<String>,
}

impl Config {
    /// Load from `config_path` (defaults when `None`) and apply overrides.
    pub fn load(config_path: Option<&str>, overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.dns_port {
            self.server.dns_port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(servers) = overrides.upstream_servers {
            self.dns.upstream_servers = servers;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dns.upstream_servers.is_empty() {
            return Err(ConfigError::Validation(
                "at least one upstream server must be configured".into(),
            ));
        }
        self.dns.upstream_addrs()?;

        if self.dns.query_timeout == 0 {
            return Err(ConfigError::Validation(
                "dns.query_timeout must be greater than zero".into(),
            ));
        }
        if self.dns.cache_max_entries == 0 {
            return Err(ConfigError::Validation(
                "dns.cache_max_entries must be greater than zero".into(),
            ));
        }
        if self.server.context_pool_size == 0 {
            return Err(ConfigError::Validation(
                "server.context_pool_size must be greater than zero".into(),
            ));
        }
        if self.server.max_udp_payload < 512 {
            return Err(ConfigError::Validation(
                "server.max_udp_payload must be at least 512".into(),
            ));
        }
        if self
            .server
            .bind_address
            .parse::<std::net::IpAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "invalid bind address '{}'",
                self.server.bind_address
            )));
        }

        Ok(())
    }
}
