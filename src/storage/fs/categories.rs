//! `CategoryStorage` over category directories

use super::FilesystemStorage;
use crate::domain::{category::validate_description, Category, CategoryIndex};
use crate::error::{Error, Result};
use crate::identity::CategoryPath;
use crate::storage::CategoryStorage;
use async_trait::async_trait;

/// Why a category is being created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Creation {
    /// Requested directly; a policy refusal is a violation
    Explicit,
    /// Implied by writing a memory beneath it; a refusal means the
    /// category is simply not there
    OnDemand,
}

impl FilesystemStorage {
    /// Make the store root usable. Returns true when the root index was
    /// written.
    pub(super) async fn ensure_root(&self) -> Result<bool> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io(&self.root, e))?;
        let root = CategoryPath::root();
        if Self::is_file(&self.index_file(&root)).await? {
            return Ok(false);
        }
        self.write_index(&root, &CategoryIndex::default()).await?;
        tracing::info!("Initialized store at {}", self.root.display());
        Ok(true)
    }

    /// Create `path` and every missing ancestor, checking the store's
    /// category mode for each directory that has to be made. Returns true
    /// when `path` itself was created.
    pub(super) async fn ensure_category(&self, path: &CategoryPath, creation: Creation) -> Result<bool> {
        let root_created = self.ensure_root().await?;
        if path.is_root() {
            return Ok(root_created);
        }

        let mut created = false;
        for prefix in path.lineage() {
            let dir = self.category_dir(&prefix);
            if Self::is_dir(&dir).await? {
                continue;
            }
            if let Some(reason) = self.policies.creation_denied(self.category_mode, &prefix) {
                return Err(match creation {
                    Creation::OnDemand => Error::CategoryNotFound {
                        path: path.to_string(),
                        missing: prefix.to_string(),
                    },
                    Creation::Explicit => Error::PolicyViolation {
                        path: prefix.to_string(),
                        reason,
                    },
                });
            }
            match tokio::fs::create_dir(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(Error::io(&dir, e)),
            }
            if self.read_index(&prefix).await?.is_none() {
                self.write_index(&prefix, &CategoryIndex::default()).await?;
            }
            self.refresh_parent_entry(&prefix, 0).await?;
            tracing::debug!("Created category {}", prefix);
            created = prefix == *path;
        }
        Ok(created)
    }
}

#[async_trait]
impl CategoryStorage for FilesystemStorage {
    async fn exists(&self, path: &CategoryPath) -> Result<bool> {
        Self::is_dir(&self.category_dir(path)).await
    }

    async fn ensure(&self, path: &CategoryPath) -> Result<bool> {
        self.ensure_category(path, Creation::Explicit).await
    }

    async fn delete(&self, path: &CategoryPath) -> Result<()> {
        if Category::is_protected_root(path) {
            return Err(Error::Protected {
                path: path.to_string(),
                reason: "root-level categories cannot be deleted; delete its subcategories or memories instead".to_string(),
            });
        }
        if self.policies.is_declared_or_ancestor(path) {
            return Err(Error::Protected {
                path: path.to_string(),
                reason: "the category is declared in the store configuration; remove the declaration first".to_string(),
            });
        }
        if let Some(missing) = self.first_missing(path).await? {
            return Err(Error::CategoryNotFound {
                path: path.to_string(),
                missing: missing.to_string(),
            });
        }

        let dir = self.category_dir(path);
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;
        tracing::info!("Deleted category {}", path);

        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let unlink = async {
            let mut index = self.read_index(&parent).await?.unwrap_or_default();
            if index.remove_subcategory(path) {
                self.write_index(&parent, &index).await?;
            }
            Ok::<(), Error>(())
        };
        unlink
            .await
            .map_err(|e| Error::partial("delete", path, "category directory removed", e))
    }

    async fn set_description(&self, path: &CategoryPath, description: Option<String>) -> Result<()> {
        if Category::is_protected_root(path) {
            return Err(Error::Protected {
                path: path.to_string(),
                reason: "root-level categories have no parent index to hold a description; describe a subcategory instead".to_string(),
            });
        }
        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(desc) = &description {
            validate_description(desc)?;
        }
        if let Some(missing) = self.first_missing(path).await? {
            return Err(Error::CategoryNotFound {
                path: path.to_string(),
                missing: missing.to_string(),
            });
        }

        let Some(parent) = path.parent() else {
            return Ok(());
        };
        let mut index = self.read_index(&parent).await?.unwrap_or_default();
        if index.subcategory(path).is_none() {
            let count = self
                .read_index(path)
                .await?
                .map(|own| own.memories.len())
                .unwrap_or(0);
            index.set_subcategory_count(path, count);
        }
        index.set_subcategory_description(path, description);
        self.write_index(&parent, &index).await
    }
}
