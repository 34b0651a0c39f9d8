use crate::types::{AggregatorError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE_NAME: &str = ".gatorconfig.json";
const ENV_CONFIG_PATH: &str = "GATOR_CONFIG";
const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Contents of `~/.gatorconfig.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub db_url: String,
    #[serde(default)]
    pub current_user_name: String,
    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// `$GATOR_CONFIG`, falling back to `~/.gatorconfig.json`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = env::var(ENV_CONFIG_PATH) {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| AggregatorError::Config("cannot locate home directory".to_string()))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    /// Reads the config from its default location. `DATABASE_URL`, when
    /// set, takes precedence over the file's `db_url`.
    pub fn read() -> Result<Self> {
        let mut config = Self::read_from(&Self::default_path()?)?;
        if let Ok(url) = env::var(ENV_DATABASE_URL) {
            config.db_url = url;
        }
        Ok(config)
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        debug!("Reading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `name` as the current user and writes the file back.
    pub fn set_user(&mut self, name: &str) -> Result<()> {
        self.current_user_name = name.to_string();
        self.write()
    }

    fn write(&self) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
