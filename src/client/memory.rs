use super::StoreClient;
use crate::domain::{Memory, MemoryUpdate};
use crate::error::{Error, Result};
use crate::identity::MemoryPath;
use crate::policy::{apply_ttl_ceiling, check, PolicyOperation};
use crate::storage::MemoryStorage;
use chrono::Utc;

/// Operations scoped to one memory path
pub struct MemoryClient<'a> {
    client: &'a StoreClient,
    path: MemoryPath,
}

impl<'a> MemoryClient<'a> {
    pub(super) fn new(client: &'a StoreClient, path: MemoryPath) -> Self {
        Self { client, path }
    }

    pub fn path(&self) -> &MemoryPath {
        &self.path
    }

    pub async fn get(&self) -> Result<Memory> {
        self.client
            .backend
            .memories
            .load(&self.path)
            .await?
            .ok_or_else(|| Error::MemoryNotFound {
                path: self.path.to_string(),
            })
    }

    /// Store a new memory. The category policy is checked first and its TTL
    /// ceiling applied; the stored memory is returned.
    pub async fn create(&self, memory: Memory) -> Result<Memory> {
        let category = self.path.category();
        let policy = self.client.policy(category);
        check(
            category,
            &policy,
            PolicyOperation::CreateMemory {
                content_len: memory.content().chars().count(),
            },
        )?;
        let memory = apply_ttl_ceiling(memory, &policy, Utc::now());
        self.client.backend.memories.add(&self.path, &memory).await?;
        tracing::debug!("Created memory {}", self.path);
        Ok(memory)
    }

    /// Apply a partial update and return the stored result
    pub async fn update(&self, update: &MemoryUpdate) -> Result<Memory> {
        if update.is_empty() {
            return Err(Error::Validation(
                "update changes nothing; pass at least one field".to_string(),
            ));
        }
        let category = self.path.category();
        let policy = self.client.policy(category);
        check(
            category,
            &policy,
            PolicyOperation::UpdateMemory {
                content_len: update.content.as_set().map(|c| c.chars().count()),
            },
        )?;

        let current = self.get().await?;
        let now = Utc::now();
        let updated = apply_ttl_ceiling(current.apply_update(update, now)?, &policy, now);
        self.client.backend.memories.save(&self.path, &updated).await?;
        tracing::debug!("Updated memory {}", self.path);
        Ok(updated)
    }

    pub async fn delete(&self) -> Result<()> {
        let category = self.path.category();
        check(
            category,
            &self.client.policy(category),
            PolicyOperation::DeleteMemory,
        )?;
        self.client.backend.memories.remove(&self.path).await
    }

    /// Move to `destination`, which must be free. Deletion must be allowed
    /// at the source and creation at the destination.
    pub async fn move_to(&self, destination: &MemoryPath) -> Result<Memory> {
        let memory = self.get().await?;
        if *destination == self.path {
            return Ok(memory);
        }
        let source = self.path.category();
        check(source, &self.client.policy(source), PolicyOperation::DeleteMemory)?;

        let target = destination.category();
        let policy = self.client.policy(target);
        check(
            target,
            &policy,
            PolicyOperation::CreateMemory {
                content_len: memory.content().chars().count(),
            },
        )?;

        self.client
            .backend
            .memories
            .move_memory(&self.path, destination)
            .await?;
        tracing::debug!("Moved memory {} -> {}", self.path, destination);

        let ceiled = apply_ttl_ceiling(memory.clone(), &policy, Utc::now());
        if ceiled != memory {
            self.client.backend.memories.save(destination, &ceiled).await?;
        }
        Ok(ceiled)
    }
}
