//! Application configuration loaded from `config.toml` plus environment overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory name under the platform config/data roots.
pub const APP_DIR: &str = "microair";

/// Prefix for environment overrides, e.g. `MICROAIR__JOBS__COUNT=10`.
pub const ENV_PREFIX: &str = "MICROAIR";

const DEFAULT_CONFIG: &str = r#"# microair configuration

# Identity used for the local player. Defaults to $USER when omitted.
# player_id = "pilot"

# Balance granted when the player is created.
starting_balance = 100000

# Fix the random seed to replay identical job boards.
# rng_seed = 42

# Where player state is persisted.
# store_path = "/home/pilot/.local/share/microair/players.json"

[jobs]
# Jobs generated per refresh.
count = 30
# Seconds a generated board stays valid.
window_secs = 240
# Revenue paid per delivered job.
revenue = 1000
"#;

/// Job board generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobBoardSettings {
    /// Jobs generated per refresh.
    pub count: usize,
    /// Seconds a generated board stays valid.
    pub window_secs: i64,
    /// Revenue paid per delivered job.
    pub revenue: u64,
}

impl Default for JobBoardSettings {
    fn default() -> Self {
        Self {
            count: 30,
            window_secs: 240,
            revenue: 1000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Local player identity.
    pub player_id: String,
    /// Balance granted at player creation.
    pub starting_balance: u64,
    /// Seed for deterministic job boards and ids.
    pub rng_seed: Option<u64>,
    /// JSON document holding every player.
    pub store_path: PathBuf,
    /// Job board settings.
    pub jobs: JobBoardSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            player_id: env::var("USER")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "player".to_string()),
            starting_balance: 100_000,
            rng_seed: None,
            store_path: default_store_path(),
            jobs: JobBoardSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path` (optional) and the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid configuration")?;
        Ok(config)
    }
}

/// Path of the user configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Default location of the player store.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("players.json")
}

/// Write the commented default configuration if no file exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(())
}
