use super::StoreClient;
use crate::domain::{Category, MemoryEntry};
use crate::error::{Error, Result};
use crate::identity::CategoryPath;
use crate::policy::{check, PolicyOperation};
use crate::storage::{CategoryStorage, IndexStorage, MemoryStorage};
use chrono::Utc;

/// Operations scoped to one category
pub struct CategoryClient<'a> {
    client: &'a StoreClient,
    path: CategoryPath,
}

impl<'a> CategoryClient<'a> {
    pub(super) fn new(client: &'a StoreClient, path: CategoryPath) -> Self {
        Self { client, path }
    }

    pub fn path(&self) -> &CategoryPath {
        &self.path
    }

    pub async fn exists(&self) -> Result<bool> {
        self.client.backend.categories.exists(&self.path).await
    }

    /// Create the category and its ancestors. Returns false when it
    /// already existed.
    pub async fn create(&self) -> Result<bool> {
        self.client.backend.categories.ensure(&self.path).await
    }

    /// Delete the category with everything beneath it
    pub async fn delete(&self) -> Result<()> {
        self.client.backend.categories.delete(&self.path).await
    }

    /// Set or clear the description. Blank text clears it.
    pub async fn set_description(&self, description: Option<String>) -> Result<()> {
        if !Category::is_protected_root(&self.path) {
            let policy = self.client.policy(&self.path);
            check(&self.path, &policy, PolicyOperation::SetDescription)?;
        }
        self.client
            .backend
            .categories
            .set_description(&self.path, description)
            .await
    }

    /// The category as its index describes it, with the description held by
    /// the parent
    pub async fn get(&self) -> Result<Category> {
        let index = match self.client.backend.indexes.load(&self.path).await? {
            Some(index) => index,
            None if self.exists().await? => Default::default(),
            None => {
                return Err(Error::CategoryNotFound {
                    path: self.path.to_string(),
                    missing: self.first_missing().await?.to_string(),
                });
            }
        };
        let description = match self.path.parent() {
            Some(parent) => self
                .client
                .backend
                .indexes
                .load(&parent)
                .await?
                .and_then(|p| p.subcategory(&self.path).and_then(|e| e.description.clone())),
            None => None,
        };
        Ok(Category::from_index(self.path.clone(), description, index))
    }

    /// Direct memories of the category. Expired memories are left out
    /// unless `include_expired` is set.
    pub async fn list_memories(&self, include_expired: bool) -> Result<Vec<MemoryEntry>> {
        let category = self.get().await?;
        if include_expired {
            return Ok(category.memories);
        }
        let now = Utc::now();
        let mut visible = Vec::with_capacity(category.memories.len());
        for entry in category.memories {
            match self.client.backend.memories.load(&entry.path).await {
                Ok(Some(memory)) if memory.is_expired(now) => {}
                Ok(Some(_)) => visible.push(entry),
                Ok(None) => tracing::warn!("Index lists missing memory {}", entry.path),
                // no readable expiry, so it cannot be expired
                Err(Error::Parse { path, reason }) => {
                    tracing::warn!("Listing {} without metadata: {}", path.display(), reason);
                    visible.push(entry);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(visible)
    }

    async fn first_missing(&self) -> Result<CategoryPath> {
        for prefix in self.path.lineage() {
            if !self.client.backend.categories.exists(&prefix).await? {
                return Ok(prefix);
            }
        }
        Ok(self.path.clone())
    }
}
