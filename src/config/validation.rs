//! Configuration validation.

use anyhow::{bail, Result};

use super::Config;

/// Validate a loaded configuration, collecting every problem into one error.
pub fn validate(config: &Config) -> Result<()> {
    let mut problems = Vec::new();

    if config.port == 0 {
        problems.push("port must be non-zero".to_string());
    }
    if config.server.database_timeout_secs == 0 {
        problems.push("server.database_timeout_secs must be non-zero".to_string());
    }
    if config.server.outbound_buffer == 0 {
        problems.push("server.outbound_buffer must be non-zero".to_string());
    }
    if !matches!(config.logging.rotation.as_str(), "daily" | "hourly" | "never") {
        problems.push(format!(
            "logging.rotation '{}' is not one of: daily, hourly, never",
            config.logging.rotation
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        bail!(problems.join("\n"))
    }
}
