use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::ProjectFilter;
use crate::status::{ProjectStatus, UnknownStatus};
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Status the dashboard list is narrowed to when no --status is given
    #[serde(default)]
    pub default_status_filter: Option<String>,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            default_status_filter: None,
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    Config::default_database_path_for_profile(utils::Profile::Prod)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Config file version {0} is newer than this build supports")]
    FutureVersion(u32),
}

impl Config {
    /// Load configuration from the profile's config file, or create it with
    /// defaults if missing
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            let config = Config {
                database_path: Self::default_database_path_for_profile(profile),
                ..Config::default()
            };
            config.save_to_path(&config_path)?;
            tracing::info!(path = %config_path.display(), "wrote default config");
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration text, rejecting files from a newer version
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        match config.config_version {
            Some(version) if version > CURRENT_CONFIG_VERSION => {
                Err(ConfigError::FutureVersion(version))
            }
            _ => Ok(config),
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let mut config = self.clone();
        config.config_version = Some(CURRENT_CONFIG_VERSION);
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("projects.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/research-desk-dev/projects.db".to_string(),
                utils::Profile::Prod => "~/.local/share/research-desk/projects.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }

    /// Dashboard filter built from CLI flags, falling back to configured
    /// defaults. The status is normalised to its stored spelling.
    pub fn project_filter(
        &self,
        status: Option<String>,
        role: Option<String>,
        journal: Option<String>,
    ) -> Result<ProjectFilter, UnknownStatus> {
        let status = status
            .or_else(|| self.default_status_filter.clone())
            .map(|raw| raw.parse::<ProjectStatus>())
            .transpose()?;

        Ok(ProjectFilter {
            status: status.map(|s| s.as_str().to_string()),
            role,
            journal,
        })
    }
}
