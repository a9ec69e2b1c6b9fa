//! `StoreStorage` over the TOML configuration file

use crate::config::CortexConfig;
use crate::error::{Error, Result};
use crate::storage::StoreStorage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Registry persistence in a single TOML file
pub struct ConfigFileStorage {
    path: PathBuf,
}

impl ConfigFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StoreStorage for ConfigFileStorage {
    async fn load(&self) -> Result<Option<CortexConfig>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };
        let config = CortexConfig::from_toml(&content).map_err(|e| {
            Error::Config(format!("{}: {}", self.path.display(), e))
        })?;
        tracing::debug!("Loaded configuration from {}", self.path.display());
        Ok(Some(config))
    }

    async fn save(&self, config: &CortexConfig) -> Result<()> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        let content = config.to_toml()?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| Error::io(&self.path, e))?;
        tracing::debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool> {
        let Some(mut config) = self.load().await? else {
            return Ok(false);
        };
        if config.stores.remove(name).is_none() {
            return Ok(false);
        }
        self.save(&config).await?;
        Ok(true)
    }
}
