use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::model::Unit;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const DEFAULT_CITY: &str = "New York";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_city() -> String {
    DEFAULT_CITY.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// api_key = "..."
/// default_city = "Oslo"
/// default_unit = "metric"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenWeather API credential. Required for any network use.
    pub api_key: Option<String>,

    /// Provider host; overridable for self-hosted proxies and tests.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// City looked up when none is given on the command line.
    #[serde(default = "default_city")]
    pub default_city: String,

    #[serde(default)]
    pub default_unit: Unit,

    /// Timeout applied to every provider request.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_city: default_city(),
            default_unit: Unit::default(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Returns the configured credential, or an actionable error.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `skycast configure` and enter your OpenWeather API key."
            )
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skycast", "skycast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
