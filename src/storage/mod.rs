//! Storage ports
//!
//! Four capability-segregated interfaces. Business logic (policy checks,
//! the client facade, the registry) is written against these traits only;
//! [`fs`] is the one concrete backend.
//!
//! Implementations return typed errors and never panic across the port
//! boundary. A multi-step write whose first step landed but whose index
//! follow-up failed reports [`crate::Error::PartialSuccess`].

pub mod fs;

pub use fs::{ConfigFileStorage, FilesystemStorage};

use crate::config::CortexConfig;
use crate::domain::{CategoryIndex, Memory};
use crate::error::Result;
use crate::identity::{CategoryPath, MemoryPath};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Memory document persistence
#[async_trait]
pub trait MemoryStorage: Send + Sync {
    /// Read a memory, `None` when it does not exist
    async fn load(&self, path: &MemoryPath) -> Result<Option<Memory>>;

    /// Create a memory; fails with `MemoryExists` when the path is taken
    async fn add(&self, path: &MemoryPath, memory: &Memory) -> Result<()>;

    /// Create or overwrite a memory
    async fn save(&self, path: &MemoryPath, memory: &Memory) -> Result<()>;

    /// Delete a memory; fails with `MemoryNotFound` when absent
    async fn remove(&self, path: &MemoryPath) -> Result<()>;

    /// Relocate a memory, keeping its content and metadata
    async fn move_memory(&self, from: &MemoryPath, to: &MemoryPath) -> Result<()>;
}

/// Per-category index persistence and bulk maintenance
#[async_trait]
pub trait IndexStorage: Send + Sync {
    /// Read a category's index, `None` when no index file exists
    async fn load(&self, category: &CategoryPath) -> Result<Option<CategoryIndex>>;

    /// Overwrite a category's index
    async fn save(&self, category: &CategoryPath, index: &CategoryIndex) -> Result<()>;

    /// Regenerate every index under `scope` from the files on disk
    async fn reindex(&self, scope: &CategoryPath) -> Result<ReindexReport>;

    /// Delete memories under `scope` whose expiry is at or before `now`
    /// and repair the indexes of the categories that lost memories
    async fn prune(
        &self,
        scope: &CategoryPath,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<PruneReport>;
}

/// Category directory lifecycle
#[async_trait]
pub trait CategoryStorage: Send + Sync {
    async fn exists(&self, path: &CategoryPath) -> Result<bool>;

    /// Create the category and any missing ancestors. Returns true when the
    /// category itself was created, false when it already existed. Ensuring
    /// the root category initializes the store.
    async fn ensure(&self, path: &CategoryPath) -> Result<bool>;

    /// Delete the category and everything beneath it
    async fn delete(&self, path: &CategoryPath) -> Result<()>;

    /// Set or clear the description held in the parent's index
    async fn set_description(&self, path: &CategoryPath, description: Option<String>)
        -> Result<()>;
}

/// Registry configuration persistence
#[async_trait]
pub trait StoreStorage: Send + Sync {
    /// Read the configuration, `None` when none has been saved yet
    async fn load(&self) -> Result<Option<CortexConfig>>;

    async fn save(&self, config: &CortexConfig) -> Result<()>;

    /// Drop one store definition; returns whether it existed
    async fn remove(&self, name: &str) -> Result<bool>;
}

/// The three per-store ports, bundled for callers that need all of them
#[derive(Clone)]
pub struct StoreBackend {
    pub memories: Arc<dyn MemoryStorage>,
    pub indexes: Arc<dyn IndexStorage>,
    pub categories: Arc<dyn CategoryStorage>,
}

impl StoreBackend {
    /// Share one implementation of all three ports
    pub fn from_shared<T>(backend: Arc<T>) -> Self
    where
        T: MemoryStorage + IndexStorage + CategoryStorage + 'static,
    {
        Self {
            memories: backend.clone(),
            indexes: backend.clone(),
            categories: backend,
        }
    }
}

/// Outcome of a full index rebuild
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub scope: CategoryPath,
    pub categories: usize,
    pub memories: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// One memory removed (or, in a dry run, that would be removed) by prune
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrunedMemory {
    pub path: MemoryPath,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of an expiry sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub scope: CategoryPath,
    pub dry_run: bool,
    pub pruned: Vec<PrunedMemory>,
}
