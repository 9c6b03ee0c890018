// Configuration loading for session tracking

use crate::session::SessionConfig;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Load session configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SessionConfig, String> {
    let path = path.as_ref();
    info!("Loading session configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config: SessionConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML config: {}", e))?;

    config.validate()?;

    info!(
        "Session configuration loaded: cap {} per user, {}s idle timeout, sweep every {}s",
        config.max_sessions_per_user, config.session_timeout_secs, config.cleanup_interval_secs
    );

    Ok(config)
}

/// Load configuration with fallback options.
///
/// Tries `SESSION_CONFIG_PATH`, then common file locations, then falls back
/// to the defaults with per-field environment overrides applied.
pub fn load_config_with_fallback() -> SessionConfig {
    dotenvy::dotenv().ok();

    if let Ok(config_path) = std::env::var("SESSION_CONFIG_PATH") {
        match load_config(&config_path) {
            Ok(config) => return config,
            Err(e) => warn!(
                "Failed to load config from SESSION_CONFIG_PATH ({}): {}",
                config_path, e
            ),
        }
    }

    for path in ["session.yaml", "session.yml"] {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return config,
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    load_config_from_env()
}

/// Defaults plus environment overrides: `SESSION_MAX_PER_USER`,
/// `SESSION_TIMEOUT_SECS`, `SESSION_CLEANUP_INTERVAL_SECS`
pub fn load_config_from_env() -> SessionConfig {
    let mut config = SessionConfig::default();

    if let Some(value) = env_parse("SESSION_MAX_PER_USER") {
        config.max_sessions_per_user = value;
    }
    if let Some(value) = env_parse("SESSION_TIMEOUT_SECS") {
        config.session_timeout_secs = value;
    }
    if let Some(value) = env_parse("SESSION_CLEANUP_INTERVAL_SECS") {
        config.cleanup_interval_secs = value;
    }

    if let Err(e) = config.validate() {
        warn!(
            "Invalid session configuration from environment ({}), using defaults",
            e
        );
        return SessionConfig::default();
    }

    config
}

fn env_parse<T: FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring invalid {} value '{}': {}", name, raw, e);
            None
        }
    }
}
