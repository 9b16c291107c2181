//! Root configuration type.

use serde::{Deserialize, Serialize};

use super::defaults::default_port;
use super::logging::LoggingConfig;
use super::server::ServerConfig;

/// Root configuration for the rooms server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port for the HTTP/WebSocket endpoint
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
