//! Filesystem storage engine
//!
//! Directory layout of one store:
//!
//! ```text
//! <root>/
//! ├── index.yaml            root category index
//! ├── readme.md             root-level memory
//! └── docs/
//!     ├── index.yaml        memories + subcategories of `docs`
//!     ├── setup.md
//!     └── guides/
//!         ├── index.yaml
//!         └── install.md
//! ```
//!
//! Every write updates exactly the affected index entries in place: the
//! memory's own category index and the memory count held for that category
//! in its parent's index. [`IndexStorage::reindex`](super::IndexStorage)
//! regenerates indexes from scratch and is the repair path for anything the
//! incremental path missed.
//!
//! There is no file locking. Two processes writing the same store race at
//! the filesystem level, and a write that lands during a reindex or prune
//! walk may be missing from, or duplicated in, the rebuilt index.

mod categories;
mod config_file;
pub mod document;
mod maintenance;
mod memories;

pub use config_file::ConfigFileStorage;

use crate::domain::memory::estimate_tokens;
use crate::domain::{CategoryIndex, Memory, MemoryEntry, Store};
use crate::error::{Error, Result};
use crate::identity::{CategoryPath, MemoryPath, Slug};
use crate::policy::{CategoryMode, PolicyTree};
use std::path::{Path, PathBuf};

/// Index file name inside every category directory
pub const INDEX_FILE: &str = "index.yaml";

/// Extension of memory documents
pub const MEMORY_EXTENSION: &str = "md";

/// Filesystem-backed implementation of the per-store ports
pub struct FilesystemStorage {
    root: PathBuf,
    category_mode: CategoryMode,
    policies: PolicyTree,
}

impl FilesystemStorage {
    /// Storage over `root` with free category creation and no declarations
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            category_mode: CategoryMode::Free,
            policies: PolicyTree::default(),
        }
    }

    /// Storage for a configured store, honoring its category mode and
    /// declared categories
    pub fn for_store(store: &Store) -> Self {
        Self {
            root: store.root().to_path_buf(),
            category_mode: store.category_mode(),
            policies: store.categories().clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn category_dir(&self, category: &CategoryPath) -> PathBuf {
        category.to_fs_path(&self.root)
    }

    fn index_file(&self, category: &CategoryPath) -> PathBuf {
        self.category_dir(category).join(INDEX_FILE)
    }

    fn memory_file(&self, path: &MemoryPath) -> PathBuf {
        path.to_fs_path(&self.root)
    }

    async fn is_dir(path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    async fn is_file(path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    /// First segment of `category` whose directory does not exist
    async fn first_missing(&self, category: &CategoryPath) -> Result<Option<CategoryPath>> {
        for prefix in category.lineage() {
            if !Self::is_dir(&self.category_dir(&prefix)).await? {
                return Ok(Some(prefix));
            }
        }
        Ok(None)
    }

    async fn read_index(&self, category: &CategoryPath) -> Result<Option<CategoryIndex>> {
        let file = self.index_file(category);
        let raw = match tokio::fs::read_to_string(&file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&file, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Some(CategoryIndex::default()));
        }
        serde_yaml::from_str(&raw).map(Some).map_err(|e| Error::Parse {
            path: file,
            reason: e.to_string(),
        })
    }

    async fn write_index(&self, category: &CategoryPath, index: &CategoryIndex) -> Result<()> {
        let file = self.index_file(category);
        let mut normalized = index.clone();
        normalized.normalize();
        let rendered = serde_yaml::to_string(&normalized)?;
        tokio::fs::write(&file, rendered)
            .await
            .map_err(|e| Error::io(&file, e))?;
        tracing::debug!("Wrote index {}", file.display());
        Ok(())
    }

    /// Upsert the memory's entry in its category index, then refresh the
    /// count held for that category by its parent
    async fn index_memory(&self, path: &MemoryPath, memory: &Memory) -> Result<()> {
        self.index_entry(entry_for(path, memory)).await
    }

    /// Upsert a prepared entry, then refresh the parent's count
    async fn index_entry(&self, entry: MemoryEntry) -> Result<()> {
        let category = entry.path.category().clone();
        let mut index = self.read_index(&category).await?.unwrap_or_default();
        index.upsert_memory(entry);
        self.write_index(&category, &index).await?;
        self.refresh_parent_entry(&category, index.memories.len())
            .await
    }

    /// Drop the memory's entry from its category index, then refresh the
    /// count held for that category by its parent
    async fn unindex_memory(&self, path: &MemoryPath) -> Result<()> {
        let category = path.category();
        let mut index = self.read_index(category).await?.unwrap_or_default();
        index.remove_memory(path);
        self.write_index(category, &index).await?;
        self.refresh_parent_entry(category, index.memories.len())
            .await
    }

    /// Make the parent's subcategory entry for `category` carry
    /// `memory_count`, creating the entry when it is missing
    async fn refresh_parent_entry(&self, category: &CategoryPath, memory_count: usize) -> Result<()> {
        let Some(parent) = category.parent() else {
            return Ok(());
        };
        let mut index = self.read_index(&parent).await?.unwrap_or_default();
        if index
            .subcategory(category)
            .is_some_and(|e| e.memory_count == memory_count)
        {
            return Ok(());
        }
        index.set_subcategory_count(category, memory_count);
        self.write_index(&parent, &index).await
    }
}

/// Index entry summarizing `memory` stored at `path`
fn entry_for(path: &MemoryPath, memory: &Memory) -> MemoryEntry {
    MemoryEntry {
        path: path.clone(),
        token_estimate: estimate_tokens(memory.content()),
        updated_at: Some(memory.metadata().updated_at),
        tags: memory.metadata().tags.to_vec(),
    }
}

/// Memory slug for a document file name (`setup.md` -> `setup`)
fn memory_slug(file_name: &str) -> Option<Slug> {
    let stem = file_name.strip_suffix(MEMORY_EXTENSION)?.strip_suffix('.')?;
    Slug::new(stem).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_slug() {
        assert_eq!(memory_slug("setup.md").unwrap().as_str(), "setup");
        assert!(memory_slug("index.yaml").is_none());
        assert!(memory_slug("Bad Name.md").is_none());
        assert!(memory_slug("md").is_none());
        let long = format!("{}.md", "a".repeat(65));
        assert_eq!(memory_slug(&long).unwrap().as_str().len(), 65);
    }

    #[test]
    fn test_paths() {
        let storage = FilesystemStorage::new("/data/store");
        let cat = CategoryPath::parse("docs/guides").unwrap();
        assert_eq!(
            storage.index_file(&cat),
            PathBuf::from("/data/store/docs/guides/index.yaml")
        );
        assert_eq!(
            storage.index_file(&CategoryPath::root()),
            PathBuf::from("/data/store/index.yaml")
        );
        let mem = MemoryPath::parse("docs/setup").unwrap();
        assert_eq!(
            storage.memory_file(&mem),
            PathBuf::from("/data/store/docs/setup.md")
        );
    }
}
