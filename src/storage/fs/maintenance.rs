//! `IndexStorage`: index persistence plus the two bulk walks, reindex and
//! prune
//!
//! Both walks use an explicit worklist instead of recursion. Categories are
//! listed in pre-order and rebuilt in reverse, so every child's memory count
//! is known before its parent's index is written.

use super::{document, memory_slug, FilesystemStorage, INDEX_FILE, MEMORY_EXTENSION};
use crate::domain::memory::estimate_tokens;
use crate::domain::{CategoryIndex, MemoryEntry, SubcategoryEntry, Tags};
use crate::error::{Error, Result};
use crate::identity::{CategoryPath, MemoryPath, Slug};
use crate::storage::{IndexStorage, PruneReport, PrunedMemory, ReindexReport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Direct contents of one category directory, sorted by path
#[derive(Debug, Default)]
struct Listing {
    subcategories: Vec<CategoryPath>,
    memories: Vec<MemoryPath>,
    /// Entries that look like categories or memories but have invalid names
    skipped: Vec<String>,
}

impl FilesystemStorage {
    async fn list_category(&self, category: &CategoryPath) -> Result<Listing> {
        let dir = self.category_dir(category);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;
        let mut listing = Listing::default();

        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') || name == INDEX_FILE {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io(entry.path(), e))?;
            if file_type.is_dir() {
                match Slug::new(name) {
                    Ok(slug) => listing.subcategories.push(category.child(slug)),
                    Err(e) => {
                        tracing::warn!("Skipping directory {}: {}", entry.path().display(), e);
                        listing.skipped.push(format!("{}: {}", entry.path().display(), e));
                    }
                }
            } else if file_type.is_file() {
                if let Some(slug) = memory_slug(name) {
                    listing
                        .memories
                        .push(MemoryPath::new(category.clone(), slug));
                } else if Path::new(name)
                    .extension()
                    .is_some_and(|ext| ext == MEMORY_EXTENSION)
                {
                    tracing::warn!("Skipping {}: not a valid memory name", entry.path().display());
                    listing
                        .skipped
                        .push(format!("{}: not a valid memory name", entry.path().display()));
                }
            }
        }

        listing.subcategories.sort();
        listing.memories.sort();
        Ok(listing)
    }

    /// Every category under `scope` (inclusive) with its listing, pre-order
    async fn walk(&self, scope: &CategoryPath) -> Result<Vec<(CategoryPath, Listing)>> {
        let mut visited = Vec::new();
        let mut pending = vec![scope.clone()];
        while let Some(category) = pending.pop() {
            let listing = self.list_category(&category).await?;
            // reversed so siblings pop in sorted order
            pending.extend(listing.subcategories.iter().rev().cloned());
            visited.push((category, listing));
        }
        Ok(visited)
    }

    /// Fail unless the scope directory exists. The root is created on demand.
    async fn require_scope(&self, scope: &CategoryPath) -> Result<()> {
        if scope.is_root() {
            self.ensure_root().await?;
            return Ok(());
        }
        match self.first_missing(scope).await? {
            Some(missing) => Err(Error::CategoryNotFound {
                path: scope.to_string(),
                missing: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Index entry for one document, read from disk. A document whose header
    /// cannot be parsed still gets an entry, without timestamp or tags.
    pub(super) async fn scan_memory(&self, path: &MemoryPath, warnings: &mut Vec<String>) -> Result<MemoryEntry> {
        let file = self.memory_file(path);
        let raw = tokio::fs::read_to_string(&file)
            .await
            .map_err(|e| Error::io(&file, e))?;

        match document::parse_header(&raw) {
            Ok((header, body)) => {
                let tags = Tags::new(header.tags.clone())
                    .map(|t| t.to_vec())
                    .unwrap_or(header.tags);
                Ok(MemoryEntry {
                    path: path.clone(),
                    token_estimate: estimate_tokens(body),
                    updated_at: header.updated_at,
                    tags,
                })
            }
            Err(reason) => {
                tracing::warn!("Indexing {} without metadata: {}", file.display(), reason);
                warnings.push(format!("{}: {}", file.display(), reason));
                Ok(MemoryEntry {
                    path: path.clone(),
                    token_estimate: estimate_tokens(&raw),
                    updated_at: None,
                    tags: Vec::new(),
                })
            }
        }
    }

    /// Previous index of a category, or nothing when it is missing or
    /// unreadable
    async fn previous_index(
        &self,
        category: &CategoryPath,
        warnings: &mut Vec<String>,
    ) -> Result<Option<CategoryIndex>> {
        match self.read_index(category).await {
            Ok(index) => Ok(index),
            Err(Error::Parse { path, reason }) => {
                tracing::warn!("Discarding unreadable index {}: {}", path.display(), reason);
                warnings.push(format!("{}: {}", path.display(), reason));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl IndexStorage for FilesystemStorage {
    async fn load(&self, category: &CategoryPath) -> Result<Option<CategoryIndex>> {
        self.read_index(category).await
    }

    async fn save(&self, category: &CategoryPath, index: &CategoryIndex) -> Result<()> {
        self.write_index(category, index).await
    }

    async fn reindex(&self, scope: &CategoryPath) -> Result<ReindexReport> {
        self.require_scope(scope).await?;
        let visited = self.walk(scope).await?;

        let mut report = ReindexReport {
            scope: scope.clone(),
            ..Default::default()
        };
        let mut counts: HashMap<CategoryPath, usize> = HashMap::new();

        for (category, listing) in visited.iter().rev() {
            let previous = self.previous_index(category, &mut report.warnings).await?;
            let descriptions: HashMap<CategoryPath, String> = previous
                .map(|index| {
                    index
                        .subcategories
                        .into_iter()
                        .filter_map(|e| e.description.map(|d| (e.path, d)))
                        .collect()
                })
                .unwrap_or_default();

            report.warnings.extend(listing.skipped.iter().cloned());
            let mut index = CategoryIndex::default();
            for path in &listing.memories {
                let entry = self.scan_memory(path, &mut report.warnings).await?;
                index.memories.push(entry);
            }
            for child in &listing.subcategories {
                index.subcategories.push(SubcategoryEntry {
                    path: child.clone(),
                    memory_count: counts.get(child).copied().unwrap_or(0),
                    description: descriptions.get(child).cloned(),
                });
            }

            self.write_index(category, &index).await?;
            report.categories += 1;
            report.memories += index.memories.len();
            counts.insert(category.clone(), index.memories.len());
        }

        let scope_count = counts.get(scope).copied().unwrap_or(0);
        self.refresh_parent_entry(scope, scope_count).await?;

        tracing::info!(
            "Reindexed '{}': {} categories, {} memories, {} warnings",
            scope,
            report.categories,
            report.memories,
            report.warnings.len()
        );
        Ok(report)
    }

    async fn prune(
        &self,
        scope: &CategoryPath,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<PruneReport> {
        self.require_scope(scope).await?;
        let visited = self.walk(scope).await?;

        let mut pruned = Vec::new();
        for (_, listing) in &visited {
            for path in &listing.memories {
                let file = self.memory_file(path);
                let raw = tokio::fs::read_to_string(&file)
                    .await
                    .map_err(|e| Error::io(&file, e))?;
                let header = match document::parse_header(&raw) {
                    Ok((header, _)) => header,
                    Err(reason) => {
                        tracing::warn!("Skipping {} during prune: {}", file.display(), reason);
                        continue;
                    }
                };
                if let Some(expires_at) = header.expires_at.filter(|at| *at <= now) {
                    pruned.push(PrunedMemory {
                        path: path.clone(),
                        expires_at,
                    });
                }
            }
        }

        let report = PruneReport {
            scope: scope.clone(),
            dry_run,
            pruned,
        };
        if dry_run || report.pruned.is_empty() {
            return Ok(report);
        }

        let mut touched: BTreeSet<CategoryPath> = BTreeSet::new();
        for item in &report.pruned {
            let file = self.memory_file(&item.path);
            match tokio::fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&file, e)),
            }
            touched.insert(item.path.category().clone());
        }
        tracing::info!("Pruned {} expired memories under '{}'", report.pruned.len(), scope);

        let repair = async {
            let mut warnings = Vec::new();
            for category in &touched {
                let listing = self.list_category(category).await?;
                let mut index = self
                    .previous_index(category, &mut warnings)
                    .await?
                    .unwrap_or_default();
                index.memories.clear();
                for path in &listing.memories {
                    index
                        .memories
                        .push(self.scan_memory(path, &mut warnings).await?);
                }
                self.write_index(category, &index).await?;
                self.refresh_parent_entry(category, index.memories.len())
                    .await?;
            }
            Ok::<(), Error>(())
        };
        let completed = format!("{} expired memories deleted", report.pruned.len());
        repair
            .await
            .map_err(|e| Error::partial("prune", scope, completed, e))?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Memory, MemoryBuilder};
    use crate::storage::{CategoryStorage, MemoryStorage};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn memory(content: &str, expires_at: Option<DateTime<Utc>>) -> Memory {
        MemoryBuilder::new(content)
            .tag("note")
            .created_at(t0())
            .expires_at(expires_at)
            .build()
            .unwrap()
    }

    fn mpath(raw: &str) -> MemoryPath {
        MemoryPath::parse(raw).unwrap()
    }

    fn cpath(raw: &str) -> CategoryPath {
        CategoryPath::parse(raw).unwrap()
    }

    /// Every index file under `root` with its raw contents
    fn snapshot(root: &Path) -> BTreeMap<PathBuf, String> {
        let mut files = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.file_name().and_then(|n| n.to_str()) == Some(INDEX_FILE) {
                    files.insert(path.clone(), std::fs::read_to_string(&path).unwrap());
                }
            }
        }
        files
    }

    fn parsed(snapshot: &BTreeMap<PathBuf, String>) -> BTreeMap<PathBuf, CategoryIndex> {
        snapshot
            .iter()
            .map(|(path, raw)| (path.clone(), serde_yaml::from_str(raw).unwrap()))
            .collect()
    }

    async fn populated() -> (FilesystemStorage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        storage.ensure(&CategoryPath::root()).await.unwrap();
        storage.add(&mpath("readme"), &memory("top level", None)).await.unwrap();
        storage
            .add(&mpath("docs/setup"), &memory("Install steps", None))
            .await
            .unwrap();
        storage
            .add(&mpath("docs/guides/install"), &memory("Run the installer", None))
            .await
            .unwrap();
        storage
            .add(&mpath("projects/cortex/idea"), &memory("Indexes", None))
            .await
            .unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn test_incremental_index_matches_rebuild() {
        let (storage, dir) = populated().await;
        MemoryStorage::save(&storage, &mpath("docs/setup"), &memory("Install steps, revised", None))
            .await
            .unwrap();
        storage
            .move_memory(&mpath("projects/cortex/idea"), &mpath("docs/guides/idea"))
            .await
            .unwrap();
        storage.remove(&mpath("readme")).await.unwrap();
        storage.ensure(&cpath("projects/empty")).await.unwrap();
        storage
            .set_description(&cpath("docs/guides"), Some("How-tos".to_string()))
            .await
            .unwrap();
        storage.delete(&cpath("projects/cortex")).await.unwrap();

        let incremental = parsed(&snapshot(dir.path()));
        storage.reindex(&CategoryPath::root()).await.unwrap();
        let rebuilt = parsed(&snapshot(dir.path()));
        assert_eq!(incremental, rebuilt);
    }

    #[tokio::test]
    async fn test_moved_legacy_document_matches_rebuild() {
        let (storage, dir) = populated().await;
        std::fs::write(
            dir.path().join("docs/legacy.md"),
            "---\ncreated_at: 2025-06-01T00:00:00Z\n---\nfrom before",
        )
        .unwrap();
        storage.reindex(&CategoryPath::root()).await.unwrap();
        storage
            .move_memory(&mpath("docs/legacy"), &mpath("docs/guides/moved"))
            .await
            .unwrap();

        let incremental = parsed(&snapshot(dir.path()));
        storage.reindex(&CategoryPath::root()).await.unwrap();
        assert_eq!(incremental, parsed(&snapshot(dir.path())));

        let guides = IndexStorage::load(&storage, &cpath("docs/guides"))
            .await
            .unwrap()
            .unwrap();
        assert!(guides.memory(&mpath("docs/guides/moved")).unwrap().updated_at.is_none());
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let (storage, dir) = populated().await;
        let first = storage.reindex(&CategoryPath::root()).await.unwrap();
        let before = snapshot(dir.path());
        let second = storage.reindex(&CategoryPath::root()).await.unwrap();
        assert_eq!(before, snapshot(dir.path()));
        assert_eq!(first, second);
        assert_eq!(first.memories, 4);
        assert_eq!(first.categories, 5);
    }

    #[tokio::test]
    async fn test_reindex_repairs_corruption() {
        let (storage, dir) = populated().await;
        let expected = snapshot(dir.path());

        std::fs::write(dir.path().join("docs").join(INDEX_FILE), "memories: [[[").unwrap();
        std::fs::remove_file(dir.path().join(INDEX_FILE)).unwrap();

        let report = storage.reindex(&CategoryPath::root()).await.unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(parsed(&expected), parsed(&snapshot(dir.path())));
    }

    #[tokio::test]
    async fn test_reindex_preserves_descriptions() {
        let (storage, _dir) = populated().await;
        storage
            .set_description(&cpath("docs/guides"), Some("How-tos".to_string()))
            .await
            .unwrap();
        storage.reindex(&CategoryPath::root()).await.unwrap();

        let docs = IndexStorage::load(&storage, &cpath("docs")).await.unwrap().unwrap();
        let guides = docs.subcategory(&cpath("docs/guides")).unwrap();
        assert_eq!(guides.description.as_deref(), Some("How-tos"));
        assert_eq!(guides.memory_count, 1);
    }

    #[tokio::test]
    async fn test_scoped_reindex_refreshes_parent_count() {
        let (storage, dir) = populated().await;
        let doc = crate::storage::fs::document::serialize(&memory("dropped in by hand", None)).unwrap();
        std::fs::write(dir.path().join("docs/guides/manual.md"), doc).unwrap();

        let report = storage.reindex(&cpath("docs/guides")).await.unwrap();
        assert_eq!(report.categories, 1);
        assert_eq!(report.memories, 2);

        let docs = IndexStorage::load(&storage, &cpath("docs")).await.unwrap().unwrap();
        assert_eq!(docs.subcategory(&cpath("docs/guides")).unwrap().memory_count, 2);
    }

    #[tokio::test]
    async fn test_reindex_missing_scope() {
        let (storage, _dir) = populated().await;
        let err = storage.reindex(&cpath("docs/nope")).await.unwrap_err();
        assert_eq!(err.code(), "CATEGORY_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_legacy_document_has_no_updated_at() {
        let (storage, dir) = populated().await;
        std::fs::write(
            dir.path().join("docs/legacy.md"),
            "---\ncreated_at: 2025-06-01T00:00:00Z\ntags: [old]\n---\nfrom before",
        )
        .unwrap();
        storage.reindex(&cpath("docs")).await.unwrap();

        let docs = IndexStorage::load(&storage, &cpath("docs")).await.unwrap().unwrap();
        let legacy = docs.memory(&mpath("docs/legacy")).unwrap();
        assert!(legacy.updated_at.is_none());
        assert_eq!(legacy.tags, vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_unparseable_document_is_still_indexed() {
        let (storage, dir) = populated().await;
        std::fs::write(dir.path().join("docs/scratch.md"), "no header here").unwrap();
        let report = storage.reindex(&cpath("docs")).await.unwrap();
        assert_eq!(report.warnings.len(), 1);

        let docs = IndexStorage::load(&storage, &cpath("docs")).await.unwrap().unwrap();
        assert!(docs.memory(&mpath("docs/scratch")).is_some());
    }

    #[tokio::test]
    async fn test_reindex_long_slug_and_invalid_names() {
        let (storage, dir) = populated().await;
        let long = "a".repeat(65);
        let doc = crate::storage::fs::document::serialize(&memory("long name", None)).unwrap();
        std::fs::write(dir.path().join(format!("docs/{}.md", long)), &doc).unwrap();
        std::fs::write(dir.path().join("docs/Bad Name.md"), &doc).unwrap();
        std::fs::create_dir(dir.path().join("docs/Not_A_Slug")).unwrap();

        let report = storage.reindex(&cpath("docs")).await.unwrap();
        assert_eq!(report.memories, 3);
        assert_eq!(report.warnings.len(), 2);

        let docs = IndexStorage::load(&storage, &cpath("docs")).await.unwrap().unwrap();
        assert!(docs.memory(&mpath(&format!("docs/{}", long))).is_some());
    }

    #[tokio::test]
    async fn test_prune_removes_only_expired() {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let now = t0() + Duration::days(10);
        storage
            .add(&mpath("notes/past"), &memory("old", Some(now - Duration::days(1))))
            .await
            .unwrap();
        storage
            .add(&mpath("notes/exact"), &memory("edge", Some(now)))
            .await
            .unwrap();
        storage
            .add(&mpath("notes/future"), &memory("later", Some(now + Duration::days(1))))
            .await
            .unwrap();
        storage
            .add(&mpath("notes/forever"), &memory("keep", None))
            .await
            .unwrap();

        let dry = storage.prune(&CategoryPath::root(), now, true).await.unwrap();
        let mut dry_paths: Vec<_> = dry.pruned.iter().map(|p| p.path.to_string()).collect();
        dry_paths.sort();
        assert_eq!(dry_paths, vec!["notes/exact", "notes/past"]);
        assert!(dir.path().join("notes/past.md").exists());

        let real = storage.prune(&CategoryPath::root(), now, false).await.unwrap();
        assert_eq!(real.pruned, dry.pruned);
        assert!(!dir.path().join("notes/past.md").exists());
        assert!(!dir.path().join("notes/exact.md").exists());
        assert!(dir.path().join("notes/future.md").exists());
        assert!(dir.path().join("notes/forever.md").exists());

        let notes = IndexStorage::load(&storage, &cpath("notes")).await.unwrap().unwrap();
        assert_eq!(notes.memories.len(), 2);
        let root = IndexStorage::load(&storage, &CategoryPath::root())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(root.subcategory(&cpath("notes")).unwrap().memory_count, 2);

        let again = storage.prune(&CategoryPath::root(), now, false).await.unwrap();
        assert!(again.pruned.is_empty());
    }

    #[tokio::test]
    async fn test_prune_repair_failure_is_partial() {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let now = t0() + Duration::days(10);
        storage
            .add(&mpath("notes/past"), &memory("old", Some(now - Duration::days(1))))
            .await
            .unwrap();
        let index = dir.path().join("notes").join(INDEX_FILE);
        std::fs::remove_file(&index).unwrap();
        std::fs::create_dir(&index).unwrap();

        let err = storage.prune(&CategoryPath::root(), now, false).await.unwrap_err();
        assert_eq!(err.code(), "PARTIAL_SUCCESS");
        assert!(!dir.path().join("notes/past.md").exists());
    }

    #[tokio::test]
    async fn test_prune_respects_scope() {
        let dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(dir.path());
        let now = t0() + Duration::days(10);
        let expired = memory("gone", Some(now - Duration::days(1)));
        storage.add(&mpath("a/one"), &expired).await.unwrap();
        storage.add(&mpath("b/two"), &expired).await.unwrap();

        let report = storage.prune(&cpath("a"), now, false).await.unwrap();
        assert_eq!(report.pruned.len(), 1);
        assert!(dir.path().join("b/two.md").exists());
    }
}
