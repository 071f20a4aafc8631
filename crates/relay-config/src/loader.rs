use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::RelayConfig;

/// Loads the relay configuration from disk and the environment.
pub struct ConfigLoader {
    config: RelayConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > RELAY_CONFIG env > ~/.relay/relay.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("RELAY_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".relay")
            .join("relay.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> relay_core::Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`ConfigLoader::load`], reading overrides through `env` instead of
    /// the process environment.
    pub fn load_with_env<F>(path: Option<&Path>, env: F) -> relay_core::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<RelayConfig>(&raw).map_err(|e| {
                relay_core::RelayError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            RelayConfig::default()
        };

        let config = Self::apply_env_overrides(config, env);

        // Log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(relay_core::RelayError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Get a copy of the loaded config.
    pub fn get(&self) -> RelayConfig {
        self.config.clone()
    }

    /// Path the config was resolved from (it may not exist).
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (RELAY_LISTEN, RELAY_PORT, RELAY_AUTH_TOKEN, ...).
    pub fn apply_env_overrides<F>(mut config: RelayConfig, env: F) -> RelayConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("RELAY_LISTEN") {
            config.server.listen = v;
        }
        // RELAY_PORT only swaps the port so it composes with RELAY_LISTEN.
        if let Some(v) = env("RELAY_PORT") {
            match v.parse::<u16>() {
                Ok(port) => config.server.set_port(port),
                Err(_) => warn!(value = %v, "ignoring RELAY_PORT, not a port number"),
            }
        }
        if let Some(v) = env("RELAY_AUTH_TOKEN") {
            config.server.auth_token = v;
        }
        if let Some(v) = env("RELAY_URL") {
            config.client.url = v;
        }
        if let Some(v) = env("RELAY_AGENT_ID") {
            config.client.agent_id = Some(v);
        }
        if let Some(v) = env("RELAY_LOG_LEVEL") {
            config.logging.level = v;
        }
        config
    }
}
