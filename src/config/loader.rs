//! Configuration loading and environment parsing.

use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;

use super::Config;

/// Environment prefix for field overrides, with `__` as nested separator.
const ENV_PREFIX: &str = "TEMPO_ROOMS__";

/// Load configuration with the following precedence (highest first):
/// 1) Environment overrides (`TEMPO_ROOMS__PORT=8080`, ...)
/// 2) File pointed to by `TEMPO_ROOMS_CONFIG_PATH`
/// 3) `config.json` in the current working directory
/// 4) Defaults compiled into the binary
///
/// Errors while reading or parsing any source are printed to stderr and that
/// source is skipped; `load()` always returns a `Config`.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged = serde_json::to_value(&defaults)
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    merge_file_source(&mut merged, Path::new("config.json"));
    if let Ok(path) = env::var("TEMPO_ROOMS_CONFIG_PATH") {
        merge_file_source(&mut merged, Path::new(&path));
    }
    apply_env_overrides(&mut merged);

    match serde_json::from_value::<Config>(merged) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Failed to deserialize config; using defaults: {error}");
            defaults
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<Value>(&contents) {
            Ok(value) => merge_values(target, value),
            Err(error) => eprintln!("Failed to parse {}: {error}", path.display()),
        },
        Err(error) => eprintln!("Failed to read {}: {error}", path.display()),
    }
}

/// Recursively merge `incoming` object fields over `target`.
fn merge_values(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target_map), Value::Object(incoming_map)) => {
            for (key, value) in incoming_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, incoming_value) => *target_slot = incoming_value,
    }
}

fn apply_env_overrides(target: &mut Value) {
    for (key, raw) in env::vars() {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = path
            .split("__")
            .map(|segment| segment.to_lowercase())
            .collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        // Values parse as JSON where possible (numbers, booleans), else as
        // plain strings.
        let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        set_path(target, &segments, value);
    }
}

fn set_path(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = target else {
        return;
    };
    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }
    let slot = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_path(slot, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overlays_nested_objects() {
        let mut base = serde_json::json!({"port": 3565, "server": {"database_timeout_secs": 10, "outbound_buffer": 64}});
        merge_values(
            &mut base,
            serde_json::json!({"server": {"database_timeout_secs": 3}}),
        );
        assert_eq!(base["server"]["database_timeout_secs"], 3);
        assert_eq!(base["server"]["outbound_buffer"], 64);
        assert_eq!(base["port"], 3565);
    }

    #[test]
    fn set_path_creates_missing_objects() {
        let mut base = serde_json::json!({});
        set_path(
            &mut base,
            &["logging".to_string(), "level".to_string()],
            Value::String("debug".to_string()),
        );
        assert_eq!(base["logging"]["level"], "debug");
    }
}
