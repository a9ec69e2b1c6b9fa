//! Store registry
//!
//! Maps store names to roots. The configuration is read once by
//! [`Registry::load`] and cached; lookups after that are synchronous.
//! Callers load once at startup, before any concurrent use.

mod resolve;

pub use resolve::{StoreResolver, StoreSource, LOCAL_STORE_DIR, LOCAL_STORE_NAME};

use crate::config::{CortexConfig, Settings, StoreDefinition};
use crate::domain::Store;
use crate::error::{Error, Result};
use crate::storage::StoreStorage;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cached view of the registry configuration
pub struct Registry {
    storage: Arc<dyn StoreStorage>,
    state: RwLock<Option<CortexConfig>>,
}

impl Registry {
    pub fn new(storage: Arc<dyn StoreStorage>) -> Self {
        Self {
            storage,
            state: RwLock::new(None),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Option<CortexConfig>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the cached configuration for a change that will be saved
    fn loaded_config(&self) -> Result<CortexConfig> {
        self.read_state().clone().ok_or_else(|| {
            Error::Config("registry is not loaded; call Registry::load() before changing stores".to_string())
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Option<CortexConfig>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the configuration into the cache. A missing configuration
    /// yields the default one with a single global store.
    pub async fn load(&self) -> Result<()> {
        let config = match self.storage.load().await? {
            Some(config) => config,
            None => {
                tracing::debug!("No saved configuration, using defaults");
                CortexConfig::default()
            }
        };
        tracing::debug!("Registry loaded with {} stores", config.stores.len());
        *self.write_state() = Some(config);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().is_some()
    }

    /// Look up a store. Fails with `StoreNotFound` when the name is unknown
    /// or the registry has not been loaded yet.
    pub fn get_store(&self, name: &str) -> Result<Store> {
        let state = self.read_state();
        let Some(config) = state.as_ref() else {
            return Err(Error::StoreNotFound {
                name: name.to_string(),
                known: Vec::new(),
            });
        };
        match config.stores.get(name) {
            Some(def) => def.to_store(name),
            None => Err(Error::StoreNotFound {
                name: name.to_string(),
                known: config.store_names(),
            }),
        }
    }

    /// All registered stores, sorted by name
    pub fn stores(&self) -> Result<Vec<Store>> {
        let state = self.read_state();
        let Some(config) = state.as_ref() else {
            return Ok(Vec::new());
        };
        config
            .stores
            .iter()
            .map(|(name, def)| def.to_store(name))
            .collect()
    }

    pub fn store_names(&self) -> Vec<String> {
        self.read_state()
            .as_ref()
            .map(CortexConfig::store_names)
            .unwrap_or_default()
    }

    /// Global settings; defaults before load
    pub fn settings(&self) -> Settings {
        self.read_state()
            .as_ref()
            .map(|c| c.settings.clone())
            .unwrap_or_default()
    }

    /// Add a store and persist the configuration
    pub async fn register(&self, name: &str, definition: StoreDefinition) -> Result<Store> {
        let store = definition.to_store(name)?;
        let mut config = self.loaded_config()?;
        if config.stores.contains_key(name) {
            return Err(Error::Validation(format!(
                "store '{}' is already registered; remove it first or pick another name",
                name
            )));
        }
        config.stores.insert(name.to_string(), definition);
        self.storage.save(&config).await?;
        *self.write_state() = Some(config);
        tracing::info!("Registered store '{}' at {}", name, store.root().display());
        Ok(store)
    }

    /// Drop a store from the configuration. Its files are left in place.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        let mut config = self.loaded_config()?;
        if config.stores.remove(name).is_none() {
            return Err(Error::StoreNotFound {
                name: name.to_string(),
                known: config.store_names(),
            });
        }
        self.storage.save(&config).await?;
        *self.write_state() = Some(config);
        tracing::info!("Unregistered store '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ConfigFileStorage;
    use tempfile::TempDir;

    fn registry(dir: &TempDir) -> Registry {
        Registry::new(Arc::new(ConfigFileStorage::new(dir.path().join("config.toml"))))
    }

    #[test]
    fn test_get_store_before_load_fails() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        assert!(!registry.is_loaded());
        let err = registry.get_store("global").unwrap_err();
        assert_eq!(err.code(), "STORE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_changes_before_load_fail() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        let err = registry
            .register("notes", StoreDefinition::new(dir.path().join("notes")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("Registry::load()"));
        assert_eq!(registry.unregister("notes").await.unwrap_err().code(), "CONFIG_ERROR");
        assert!(!dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_lookup_is_synchronous_after_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[stores.work]\npath = \"/srv/work\"\n",
        )
        .unwrap();
        let registry = registry(&dir);
        tokio_test::block_on(registry.load()).unwrap();

        let store = registry.get_store("work").unwrap();
        assert_eq!(store.root(), std::path::Path::new("/srv/work"));

        let err = registry.get_store("missing").unwrap_err();
        assert!(matches!(err, Error::StoreNotFound { ref known, .. } if known == &["work".to_string()]));
    }

    #[tokio::test]
    async fn test_missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.load().await.unwrap();
        assert!(registry.is_loaded());
        assert_eq!(registry.settings().default_store, "global");
    }

    #[tokio::test]
    async fn test_register_and_unregister_persist() {
        let dir = TempDir::new().unwrap();
        let registry = registry(&dir);
        registry.load().await.unwrap();

        let root = dir.path().join("notes");
        registry
            .register("notes", StoreDefinition::new(&root))
            .await
            .unwrap();
        let err = registry
            .register("notes", StoreDefinition::new(&root))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let reloaded = super::Registry::new(Arc::new(ConfigFileStorage::new(
            dir.path().join("config.toml"),
        )));
        reloaded.load().await.unwrap();
        assert_eq!(reloaded.get_store("notes").unwrap().root(), root.as_path());

        registry.unregister("notes").await.unwrap();
        assert!(registry.get_store("notes").is_err());
        assert_eq!(
            registry.unregister("notes").await.unwrap_err().code(),
            "STORE_NOT_FOUND"
        );
    }
}
