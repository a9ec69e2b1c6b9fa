//! `MemoryStorage` over memory documents

use super::categories::Creation;
use super::{document, FilesystemStorage};
use crate::domain::Memory;
use crate::error::{Error, Result};
use crate::identity::MemoryPath;
use crate::storage::MemoryStorage;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

impl FilesystemStorage {
    async fn write_document(&self, path: &MemoryPath, memory: &Memory, create_new: bool) -> Result<()> {
        let file = self.memory_file(path);
        let rendered = document::serialize(memory)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true);
        if create_new {
            options.create_new(true);
        } else {
            options.create(true).truncate(true);
        }
        let mut handle = match options.open(&file).await {
            Ok(handle) => handle,
            Err(e) if create_new && e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::MemoryExists {
                    path: path.to_string(),
                });
            }
            Err(e) => return Err(Error::io(&file, e)),
        };
        handle
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| Error::io(&file, e))?;
        handle.flush().await.map_err(|e| Error::io(&file, e))
    }
}

#[async_trait]
impl MemoryStorage for FilesystemStorage {
    async fn load(&self, path: &MemoryPath) -> Result<Option<Memory>> {
        let file = self.memory_file(path);
        match tokio::fs::read_to_string(&file).await {
            Ok(raw) => document::parse(&raw, &file).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&file, e)),
        }
    }

    async fn add(&self, path: &MemoryPath, memory: &Memory) -> Result<()> {
        if Self::is_file(&self.memory_file(path)).await? {
            return Err(Error::MemoryExists {
                path: path.to_string(),
            });
        }
        self.ensure_category(path.category(), Creation::OnDemand)
            .await?;
        self.write_document(path, memory, true).await?;
        tracing::debug!("Added memory {}", path);

        self.index_memory(path, memory)
            .await
            .map_err(|e| Error::partial("add", path, "memory file written", e))
    }

    async fn save(&self, path: &MemoryPath, memory: &Memory) -> Result<()> {
        self.ensure_category(path.category(), Creation::OnDemand)
            .await?;
        self.write_document(path, memory, false).await?;
        tracing::debug!("Saved memory {}", path);

        self.index_memory(path, memory)
            .await
            .map_err(|e| Error::partial("save", path, "memory file written", e))
    }

    async fn remove(&self, path: &MemoryPath) -> Result<()> {
        let file = self.memory_file(path);
        match tokio::fs::remove_file(&file).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MemoryNotFound {
                    path: path.to_string(),
                });
            }
            Err(e) => return Err(Error::io(&file, e)),
        }
        tracing::debug!("Removed memory {}", path);

        self.unindex_memory(path)
            .await
            .map_err(|e| Error::partial("remove", path, "memory file deleted", e))
    }

    async fn move_memory(&self, from: &MemoryPath, to: &MemoryPath) -> Result<()> {
        if self.load(from).await?.is_none() {
            return Err(Error::MemoryNotFound {
                path: from.to_string(),
            });
        }
        if from == to {
            return Ok(());
        }
        if Self::is_file(&self.memory_file(to)).await? {
            return Err(Error::MemoryExists {
                path: to.to_string(),
            });
        }
        self.ensure_category(to.category(), Creation::OnDemand)
            .await?;

        let source = self.memory_file(from);
        let target = self.memory_file(to);
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| Error::io(&source, e))?;
        tracing::debug!("Moved memory {} -> {}", from, to);

        let completed = format!("memory file moved to '{}'", to);
        self.unindex_memory(from)
            .await
            .map_err(|e| Error::partial("move", from, completed.clone(), e))?;
        // the file moves byte for byte, so its entry comes from disk
        let indexed = async {
            let entry = self.scan_memory(to, &mut Vec::new()).await?;
            self.index_entry(entry).await
        };
        indexed
            .await
            .map_err(|e| Error::partial("move", from, completed, e))
    }
}
