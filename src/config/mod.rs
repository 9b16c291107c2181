//! Configuration module.
//!
//! Configuration is loaded from `config.json` (working directory or the path
//! in `TEMPO_ROOMS_CONFIG_PATH`), with individual fields overridable through
//! environment variables prefixed `TEMPO_ROOMS` using `__` as a nested
//! separator, e.g. `TEMPO_ROOMS__PORT=8080` or
//! `TEMPO_ROOMS__LOGGING__LEVEL=debug`. Compiled defaults fill the rest.

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use server::ServerConfig;

pub use types::Config;

pub use validation::validate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3565);
        assert_eq!(config.server.database_timeout_secs, 10);
        assert_eq!(config.server.outbound_buffer, 64);
        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.filename, "server.log");
        assert_eq!(config.logging.rotation, "daily");
        assert!(!config.logging.enable_file_logging);
    }

    #[test]
    fn partial_json_is_filled_with_defaults() {
        let config: Config = serde_json::from_str(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.server.database_timeout_secs, 10);
    }

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default()).is_ok());
    }
}
