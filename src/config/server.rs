//! Server behavior configuration types.

use serde::{Deserialize, Serialize};

use super::defaults::{default_database_timeout_secs, default_outbound_buffer};

/// Server configuration for room and session management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Timeout applied to every database collaborator call (seconds).
    /// Database calls are the only operations with an enforced timeout.
    #[serde(default = "default_database_timeout_secs")]
    pub database_timeout_secs: u64,
    /// Per-connection outbound message buffer size. Messages beyond the
    /// buffer are dropped for that connection rather than blocking the room.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_timeout_secs: default_database_timeout_secs(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}
