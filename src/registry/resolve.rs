//! Layered store resolution: explicit name, then a store local to the
//! working directory, then the configured default

use super::Registry;
use crate::domain::Store;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Directory that marks a working-directory local store
pub const LOCAL_STORE_DIR: &str = ".cortex";

/// Name given to a working-directory local store
pub const LOCAL_STORE_NAME: &str = "local";

/// Where a resolved store came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSource {
    Explicit,
    Local,
    Default,
}

/// Resolves the store a command should act on
pub struct StoreResolver<'a> {
    registry: &'a Registry,
    cwd: PathBuf,
}

impl<'a> StoreResolver<'a> {
    pub fn new(registry: &'a Registry, cwd: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            cwd: cwd.into(),
        }
    }

    /// Root a local store would have in the working directory
    pub fn local_root(&self) -> PathBuf {
        self.cwd.join(LOCAL_STORE_DIR)
    }

    fn local_store(&self) -> Result<Option<Store>> {
        let root = self.local_root();
        if !is_dir(&root) {
            return Ok(None);
        }
        Store::new(LOCAL_STORE_NAME, root)
            .map(|store| store.with_description(Some("Working-directory store".to_string())))
            .map(Some)
    }

    /// Pick a store. An explicit name always wins; otherwise a local store
    /// is used when present. Without one, `strict_local` makes resolution
    /// fail instead of falling back to the default store.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<(Store, StoreSource)> {
        if let Some(name) = explicit {
            if name == LOCAL_STORE_NAME && !self.registry.store_names().iter().any(|n| n == name) {
                return match self.local_store()? {
                    Some(store) => Ok((store, StoreSource::Explicit)),
                    None => Err(Error::LocalStoreMissing {
                        dir: self.cwd.clone(),
                    }),
                };
            }
            return Ok((self.registry.get_store(name)?, StoreSource::Explicit));
        }

        if let Some(store) = self.local_store()? {
            tracing::debug!("Using local store at {}", store.root().display());
            return Ok((store, StoreSource::Local));
        }

        let settings = self.registry.settings();
        if settings.strict_local {
            return Err(Error::LocalStoreMissing {
                dir: self.cwd.clone(),
            });
        }
        let store = self.registry.get_store(&settings.default_store)?;
        Ok((store, StoreSource::Default))
    }
}

fn is_dir(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ConfigFileStorage;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn loaded(dir: &TempDir, config: &str) -> Registry {
        let file = dir.path().join("config.toml");
        std::fs::write(&file, config).unwrap();
        let registry = Registry::new(Arc::new(ConfigFileStorage::new(file)));
        registry.load().await.unwrap();
        registry
    }

    const CONFIG: &str = r#"
[settings]
default_store = "global"

[stores.global]
path = "/srv/cortex/global"

[stores.work]
path = "/srv/cortex/work"
"#;

    #[tokio::test]
    async fn test_explicit_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(LOCAL_STORE_DIR)).unwrap();
        let registry = loaded(&dir, CONFIG).await;

        let (store, source) = StoreResolver::new(&registry, dir.path())
            .resolve(Some("work"))
            .unwrap();
        assert_eq!(store.name(), "work");
        assert_eq!(source, StoreSource::Explicit);
    }

    #[tokio::test]
    async fn test_local_before_default() {
        let dir = TempDir::new().unwrap();
        let registry = loaded(&dir, CONFIG).await;
        let resolver = StoreResolver::new(&registry, dir.path());

        let (store, source) = resolver.resolve(None).unwrap();
        assert_eq!(store.name(), "global");
        assert_eq!(source, StoreSource::Default);

        std::fs::create_dir(dir.path().join(LOCAL_STORE_DIR)).unwrap();
        let (store, source) = resolver.resolve(None).unwrap();
        assert_eq!(store.name(), LOCAL_STORE_NAME);
        assert_eq!(store.root(), dir.path().join(LOCAL_STORE_DIR).as_path());
        assert_eq!(source, StoreSource::Local);
    }

    #[tokio::test]
    async fn test_strict_local_does_not_fall_back() {
        let dir = TempDir::new().unwrap();
        let config = format!("[settings]\nstrict_local = true\n{}", &CONFIG[CONFIG.find("[stores.global]").unwrap()..]);
        let registry = loaded(&dir, &config).await;

        let err = StoreResolver::new(&registry, dir.path())
            .resolve(None)
            .unwrap_err();
        assert_eq!(err.code(), "LOCAL_STORE_MISSING");

        let (store, _) = StoreResolver::new(&registry, dir.path())
            .resolve(Some("work"))
            .unwrap();
        assert_eq!(store.name(), "work");
    }

    #[tokio::test]
    async fn test_unknown_explicit_store() {
        let dir = TempDir::new().unwrap();
        let registry = loaded(&dir, CONFIG).await;
        let err = StoreResolver::new(&registry, dir.path())
            .resolve(Some("nope"))
            .unwrap_err();
        assert!(err.to_string().contains("global, work"));
    }
}
