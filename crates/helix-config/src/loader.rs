//! Config file loading with environment overrides.
//!
//! Reads a json5 config file when present and applies a small set of
//! environment overrides on top, so deployments can tune the memory bound
//! and session expiry without editing files.

use crate::{ConfigError, HelixConfig};
use log::{debug, info};
use std::path::Path;

/// Environment override for the per-session memory bound.
const ENV_MAX_MEMORY_ITEMS: &str = "HELIX_MAX_MEMORY_ITEMS";
/// Environment override for session expiry in hours.
const ENV_SESSION_EXPIRY_HOURS: &str = "HELIX_SESSION_EXPIRY_HOURS";

/// Load config from a json5 file, falling back to defaults when missing,
/// and apply environment overrides.
pub fn load_config(path: impl AsRef<Path>) -> Result<HelixConfig, ConfigError> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        info!("loading config (path={})", path.display());
        let raw = std::fs::read_to_string(path)?;
        json5::from_str(&raw)?
    } else {
        debug!("config file missing, using defaults (path={})", path.display());
        HelixConfig::default()
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Load config applying overrides from the supplied lookup instead of the
/// process environment. Exposed for tests and embedding callers.
pub fn load_config_with_env(
    base: HelixConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<HelixConfig, ConfigError> {
    let mut config = base;
    apply_env_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Apply recognized environment overrides onto a config.
fn apply_env_overrides(
    config: &mut HelixConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(ENV_MAX_MEMORY_ITEMS) {
        let value = raw
            .trim()
            .parse::<usize>()
            .map_err(|err| ConfigError::InvalidOverride {
                name: ENV_MAX_MEMORY_ITEMS.to_string(),
                message: err.to_string(),
            })?;
        debug!("applying override ({}={})", ENV_MAX_MEMORY_ITEMS, value);
        config.memory.max_items = value;
    }
    if let Some(raw) = lookup(ENV_SESSION_EXPIRY_HOURS) {
        let value = raw
            .trim()
            .parse::<i64>()
            .map_err(|err| ConfigError::InvalidOverride {
                name: ENV_SESSION_EXPIRY_HOURS.to_string(),
                message: err.to_string(),
            })?;
        debug!("applying override ({}={})", ENV_SESSION_EXPIRY_HOURS, value);
        config.sessions.expiry_hours = value;
    }
    Ok(())
}

/// Reject configs that cannot drive the pipeline.
fn validate(config: &HelixConfig) -> Result<(), ConfigError> {
    if config.memory.max_items == 0 {
        return Err(ConfigError::InvalidField {
            path: "memory.max_items".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.ingest.chunk_size == 0 {
        return Err(ConfigError::InvalidField {
            path: "ingest.chunk_size".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.ingest.chunk_overlap >= config.ingest.chunk_size {
        return Err(ConfigError::InvalidField {
            path: "ingest.chunk_overlap".to_string(),
            message: "must be smaller than chunk_size".to_string(),
        });
    }
    if config.sessions.expiry_hours <= 0 {
        return Err(ConfigError::InvalidField {
            path: "sessions.expiry_hours".to_string(),
            message: "must be positive".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, load_config_with_env};
    use crate::{ConfigError, HelixConfig};
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn load_config_reads_json5_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("helix.json5");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            "{{ memory: {{ max_items: 12 }}, analyze: {{ retrieval_k: 3 }} }}"
        )
        .expect("write");

        let config = load_config(&path).expect("config");
        assert_eq!(config.memory.max_items, 12);
        assert_eq!(config.analyze.retrieval_k, 3);
        assert_eq!(config.sessions.expiry_hours, 24);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let config = load_config(dir.path().join("absent.json5")).expect("config");
        assert_eq!(config.memory.max_items, 100);
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let config = load_config_with_env(HelixConfig::default(), |name| match name {
            "HELIX_MAX_MEMORY_ITEMS" => Some("5".to_string()),
            "HELIX_SESSION_EXPIRY_HOURS" => Some("48".to_string()),
            _ => None,
        })
        .expect("config");
        assert_eq!(config.memory.max_items, 5);
        assert_eq!(config.sessions.expiry_hours, 48);
    }

    #[test]
    fn bad_override_is_rejected() {
        let err = load_config_with_env(HelixConfig::default(), |name| {
            (name == "HELIX_MAX_MEMORY_ITEMS").then(|| "many".to_string())
        })
        .expect_err("override");
        match err {
            ConfigError::InvalidOverride { name, .. } => {
                assert_eq!(name, "HELIX_MAX_MEMORY_ITEMS")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_max_items_is_invalid() {
        let mut config = HelixConfig::default();
        config.memory.max_items = 0;
        let err = load_config_with_env(config, |_| None).expect_err("validate");
        match err {
            ConfigError::InvalidField { path, .. } => assert_eq!(path, "memory.max_items"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
