//! Default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system.

use super::logging::LogFormat;

pub const fn default_port() -> u16 {
    3565
}

// =============================================================================
// Server Defaults
// =============================================================================

pub const fn default_database_timeout_secs() -> u64 {
    10
}

pub const fn default_outbound_buffer() -> usize {
    64
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}
