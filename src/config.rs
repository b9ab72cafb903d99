use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

static DEFAULT_STATE_FILE: &str = "~/.local/share/calsync/state.json";
static DEFAULT_TRANSPORT: &str = "caldav";
const DEFAULT_EXPANSION_HORIZON_DAYS: i64 = 90;

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_transport() -> String {
    DEFAULT_TRANSPORT.to_string()
}

fn default_expansion_horizon_days() -> i64 {
    DEFAULT_EXPANSION_HORIZON_DAYS
}

/// Global configuration at ~/.config/calsync/config.toml
///
/// Every key can be overridden from the environment, e.g. `CALSYNC_OFFLINE=true`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalsyncConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Suffix of the transport binary: `calsync-transport-<name>`.
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Treat the network as unavailable.
    #[serde(default)]
    pub offline: bool,

    #[serde(default = "default_expansion_horizon_days")]
    pub expansion_horizon_days: i64,
}

impl Default for CalsyncConfig {
    fn default() -> Self {
        CalsyncConfig {
            state_file: default_state_file(),
            transport: default_transport(),
            offline: false,
            expansion_horizon_days: DEFAULT_EXPANSION_HORIZON_DAYS,
        }
    }
}

impl CalsyncConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("calsync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the global config, writing a commented default on first use.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("CALSYNC"))
            .build()
            .context("Could not read config")?
            .try_deserialize()
            .context("Invalid config")
    }

    /// State file path with `~` expanded.
    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state_file.to_string_lossy()).into_owned())
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> Result<()> {
        let defaults = toml::to_string_pretty(&CalsyncConfig::default())
            .context("Could not render default config")?;
        let commented: String = defaults.lines().map(|line| format!("# {line}\n")).collect();
        let contents = format!("# calsync configuration\n\n{commented}");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Could not create config directory")?;
        }

        std::fs::write(path, contents).context("Could not write config file")?;

        Ok(())
    }
}
