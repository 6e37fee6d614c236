use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Client configuration for cpm
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Base URL of the package repository service
    #[serde(default = "defaults::default_registry_url")]
    pub registry_url: String,
    /// Timeout for a whole HTTP round-trip, in seconds
    #[serde(default = "defaults::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory downloaded packages are extracted into
    #[serde(default = "defaults::default_dest_dir")]
    pub dest_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            registry_url: defaults::default_registry_url(),
            timeout_secs: defaults::default_timeout_secs(),
            dest_dir: defaults::default_dest_dir(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from the config file and environment variables.
    /// A missing config file means defaults.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Ok(config_path) if config_path.exists() => {
                tracing::debug!("loading cpm config from {:?}", config_path);
                Self::load_from_file(&config_path)?
            }
            _ => Self::default(),
        };

        if let Ok(url) = env::var("CPM_REGISTRY_URL") {
            config.registry_url = url;
        }

        if let Ok(secs) = env::var("CPM_TIMEOUT_SECS") {
            config.timeout_secs = secs
                .parse()
                .context("Failed to parse CPM_TIMEOUT_SECS as u64")?;
        }

        if let Ok(dir) = env::var("CPM_DEST_DIR") {
            config.dest_dir = expand_tilde(&PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: RegistryConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.dest_dir = expand_tilde(&config.dest_dir);

        Ok(config)
    }

    /// Save configuration to file
    #[allow(dead_code)]
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/cpm/config.yaml"))
            .context("Could not determine home directory for config file")
    }
}

mod defaults {
    use std::path::PathBuf;

    pub(crate) fn default_registry_url() -> String {
        "https://registry.colonyos.local/api".to_string()
    }

    pub(crate) fn default_timeout_secs() -> u64 {
        30
    }

    pub(crate) fn default_dest_dir() -> PathBuf {
        PathBuf::from("./pkgs")
    }
}
