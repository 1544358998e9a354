//! Relay configuration loader.
//!
//! Reads `config.toml` from the data directory (`~/.chatrelay/` in production)
//! or an explicit path, and deserializes it into [`RelayConfig`]. The data-dir
//! file is optional: a missing or malformed file falls back to defaults.

use std::path::{Path, PathBuf};

use chatrelay_types::config::RelayConfig;
use chatrelay_types::error::ConfigError;

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "CHATRELAY_DATA_DIR";

/// Environment variable that overrides `web_dir`.
pub const WEB_DIR_ENV: &str = "CHATRELAY_WEB_DIR";

/// Resolve the chatrelay data directory.
///
/// Priority: `CHATRELAY_DATA_DIR`, then `~/.chatrelay`, then `.chatrelay`
/// relative to the working directory when no home directory is known.
pub fn resolve_data_dir() -> PathBuf {
    data_dir_from_env(DATA_DIR_ENV)
}

fn data_dir_from_env(var: &str) -> PathBuf {
    if let Some(dir) = non_empty_env(var) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".chatrelay"))
        .unwrap_or_else(|| PathBuf::from(".chatrelay"))
}

/// Load relay configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`RelayConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config, normalized.
pub async fn load_relay_config(data_dir: &Path) -> RelayConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return with_env_overrides(RelayConfig::default());
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return with_env_overrides(RelayConfig::default());
        }
    };

    match parse_relay_config(&content, &config_path) {
        Ok(config) => with_env_overrides(config),
        Err(err) => {
            tracing::warn!("{err}, using defaults");
            with_env_overrides(RelayConfig::default())
        }
    }
}

/// Load relay configuration from an explicitly named file.
///
/// Unlike [`load_relay_config`], a missing or malformed file is an error:
/// the caller asked for this file by name.
pub async fn read_relay_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
    parse_relay_config(&content, path).map(with_env_overrides)
}

fn parse_relay_config(content: &str, path: &Path) -> Result<RelayConfig, ConfigError> {
    toml::from_str::<RelayConfig>(content)
        .map(normalize)
        .map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
}

/// Replace values that would make the relay unusable with their defaults.
fn normalize(mut config: RelayConfig) -> RelayConfig {
    let defaults = RelayConfig::default();
    if config.max_turns == 0 {
        tracing::warn!(
            "max_turns = 0 would discard every turn, using {}",
            defaults.max_turns
        );
        config.max_turns = defaults.max_turns;
    }
    if config.stream_buffer == 0 {
        tracing::warn!("stream_buffer = 0 is not a valid channel size, using 1");
        config.stream_buffer = 1;
    }
    if config.fallback_session_id.is_empty() {
        config.fallback_session_id = defaults.fallback_session_id;
    }
    config
}

fn with_env_overrides(config: RelayConfig) -> RelayConfig {
    web_dir_from_env(config, WEB_DIR_ENV)
}

fn web_dir_from_env(mut config: RelayConfig, var: &str) -> RelayConfig {
    if let Some(dir) = non_empty_env(var) {
        config.web_dir = dir;
    }
    config
}

/// An unset or empty variable counts as absent.
fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|value| !value.is_empty())
}
