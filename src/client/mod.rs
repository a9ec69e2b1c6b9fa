//! Client facade
//!
//! A [`StoreClient`] binds one resolved store to its storage backend and
//! hands out scoped [`CategoryClient`] and [`MemoryClient`] handles. Every
//! mutation resolves the category policy, validates it, and applies the
//! TTL ceiling before touching storage.

mod category;
mod memory;

pub use category::CategoryClient;
pub use memory::MemoryClient;

use crate::domain::index::sort_by_recency;
use crate::domain::{Memory, MemoryEntry, Store};
use crate::error::Result;
use crate::identity::{CategoryPath, MemoryPath};
use crate::policy::ResolvedPolicy;
use crate::storage::{
    CategoryStorage, FilesystemStorage, IndexStorage, PruneReport, ReindexReport, StoreBackend,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Operations on one store
pub struct StoreClient {
    store: Store,
    backend: StoreBackend,
}

impl StoreClient {
    /// Client over the store's directory on the local filesystem
    pub fn open(store: Store) -> Self {
        let backend = StoreBackend::from_shared(Arc::new(FilesystemStorage::for_store(&store)));
        Self { store, backend }
    }

    pub fn with_backend(store: Store, backend: StoreBackend) -> Self {
        Self { store, backend }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Materialize the store root and its root index. Returns true when
    /// anything was created.
    pub async fn initialize(&self) -> Result<bool> {
        let created = self.backend.categories.ensure(&CategoryPath::root()).await?;
        if created {
            tracing::info!("Initialized store '{}'", self.store.name());
        }
        Ok(created)
    }

    pub fn category(&self, path: CategoryPath) -> CategoryClient<'_> {
        CategoryClient::new(self, path)
    }

    pub fn memory(&self, path: MemoryPath) -> MemoryClient<'_> {
        MemoryClient::new(self, path)
    }

    pub async fn reindex(&self, scope: &CategoryPath) -> Result<ReindexReport> {
        self.backend.indexes.reindex(scope).await
    }

    /// Sweep memories under `scope` that have expired by now
    pub async fn prune(&self, scope: &CategoryPath, dry_run: bool) -> Result<PruneReport> {
        self.backend.indexes.prune(scope, Utc::now(), dry_run).await
    }

    /// Up to `limit` memory entries under `scope`, newest first. Entries
    /// without a timestamp come last.
    pub async fn recent(&self, scope: &CategoryPath, limit: usize) -> Result<Vec<MemoryEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![scope.clone()];
        while let Some(category) = pending.pop() {
            let Some(index) = self.backend.indexes.load(&category).await? else {
                continue;
            };
            entries.extend(index.memories);
            pending.extend(index.subcategories.into_iter().map(|s| s.path));
        }
        sort_by_recency(&mut entries);
        entries.truncate(limit);
        Ok(entries)
    }

    fn policy(&self, category: &CategoryPath) -> ResolvedPolicy {
        self.store.categories().resolve(category)
    }
}

/// A memory as presented to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryRecord {
    pub path: MemoryPath,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
    pub token_estimate: usize,
    pub content: String,
}

impl MemoryRecord {
    pub fn new(path: &MemoryPath, memory: &Memory) -> Self {
        let meta = memory.metadata();
        Self {
            path: path.clone(),
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            tags: meta.tags.to_vec(),
            source: meta.source.clone(),
            expires_at: meta.expires_at,
            citations: meta.citations.clone(),
            token_estimate: memory.token_estimate(),
            content: memory.content().to_string(),
        }
    }
}
