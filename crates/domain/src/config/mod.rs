//! Configuration module for relaydns
//!
//! This module contains all configuration structures organized by domain:
//! - `root`: Main configuration and CLI overrides
//! - `server`: Listener ports and binding
//! - `dns`: Upstream nameservers, retries and cache settings
//! - `logging`: Logging settings
//! - `errors`: Configuration errors

pub mod dns;
pub mod errors;
pub mod logging;
pub mod root;
pub mod server;

pub use dns::DnsConfig;
pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use root::{CliOverrides, Config};
pub use server::ServerConfig;
