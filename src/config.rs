// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 waterworks contributors

//! User configuration
//!
//! Remembers where account configuration files live, in
//! `~/.waterworks/config.yml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::errors::{WaterworksError, WaterworksResult};

/// Contents of the user config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Directory holding `<account_name>.yml` files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_configs_path: Option<PathBuf>,
}

/// Location of the user config file
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `~/.waterworks/config.yml`
    pub fn default_location() -> WaterworksResult<Self> {
        let dirs = directories::BaseDirs::new().ok_or_else(|| WaterworksError::Config {
            message: "Could not determine your home directory".into(),
            help: Some("Pass --account-configs-path explicitly".into()),
        })?;
        Ok(Self::new(dirs.home_dir().join(".waterworks").join("config.yml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, or the default when no file exists yet
    pub async fn load(&self) -> WaterworksResult<UserConfig> {
        if !self.path.exists() {
            debug!("No user config at {}", self.path.display());
            return Ok(UserConfig::default());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| WaterworksError::FileReadError {
                path: self.path.clone(),
                error: e.to_string(),
            })?;

        if content.trim().is_empty() {
            return Ok(UserConfig::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub async fn save(&self, config: &UserConfig) -> WaterworksResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WaterworksError::FileWriteError {
                    path: parent.to_path_buf(),
                    error: e.to_string(),
                })?;
        }

        let content = serde_yaml::to_string(config)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| WaterworksError::FileWriteError {
                path: self.path.clone(),
                error: e.to_string(),
            })
    }

    /// Remember a new account configs directory
    pub async fn set_account_configs_path(&self, path: &Path) -> WaterworksResult<UserConfig> {
        let mut config = self.load().await?;
        config.account_configs_path = Some(path.to_path_buf());
        self.save(&config).await?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.yml"));
        assert_eq!(store.load().await.unwrap(), UserConfig::default());
    }

    #[tokio::test]
    async fn test_set_account_configs_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested").join("config.yml"));

        store.set_account_configs_path(Path::new("/srv/accounts")).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.account_configs_path, Some(PathBuf::from("/srv/accounts")));
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("account_configs_path"));
    }
}
