//! Per-category index
//!
//! An index is a derived cache of a category's direct memories and direct
//! subcategories. It can always be regenerated from the filesystem, with the
//! exception of subcategory descriptions, which live only here.

use crate::identity::{CategoryPath, MemoryPath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Summary of one memory, stored in its category's index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub path: MemoryPath,
    pub token_estimate: usize,
    /// Absent on legacy entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Summary of one direct child category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubcategoryEntry {
    pub path: CategoryPath,
    pub memory_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Index file contents for one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryIndex {
    #[serde(default)]
    pub memories: Vec<MemoryEntry>,
    #[serde(default)]
    pub subcategories: Vec<SubcategoryEntry>,
}

impl CategoryIndex {
    pub fn memory(&self, path: &MemoryPath) -> Option<&MemoryEntry> {
        self.memories
            .iter()
            .find(|e| e.path.as_str() == path.as_str())
    }

    pub fn subcategory(&self, path: &CategoryPath) -> Option<&SubcategoryEntry> {
        self.subcategories
            .iter()
            .find(|e| e.path.as_str() == path.as_str())
    }

    /// Insert or replace the entry with the same path. Returns true when an
    /// existing entry was replaced.
    pub fn upsert_memory(&mut self, entry: MemoryEntry) -> bool {
        let replaced = match self
            .memories
            .iter_mut()
            .find(|e| e.path.as_str() == entry.path.as_str())
        {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.memories.push(entry);
                false
            }
        };
        self.normalize();
        replaced
    }

    /// Drop the entry for `path`, returning whether one existed
    pub fn remove_memory(&mut self, path: &MemoryPath) -> bool {
        let before = self.memories.len();
        self.memories.retain(|e| e.path.as_str() != path.as_str());
        before != self.memories.len()
    }

    /// Set the memory count of a child, creating its entry if needed and
    /// leaving any description untouched
    pub fn set_subcategory_count(&mut self, path: &CategoryPath, memory_count: usize) {
        match self
            .subcategories
            .iter_mut()
            .find(|e| e.path.as_str() == path.as_str())
        {
            Some(existing) => existing.memory_count = memory_count,
            None => {
                self.subcategories.push(SubcategoryEntry {
                    path: path.clone(),
                    memory_count,
                    description: None,
                });
                self.normalize();
            }
        }
    }

    /// Set or clear a child's description. Returns false when the child has
    /// no entry.
    pub fn set_subcategory_description(
        &mut self,
        path: &CategoryPath,
        description: Option<String>,
    ) -> bool {
        match self
            .subcategories
            .iter_mut()
            .find(|e| e.path.as_str() == path.as_str())
        {
            Some(existing) => {
                existing.description = description;
                true
            }
            None => false,
        }
    }

    pub fn remove_subcategory(&mut self, path: &CategoryPath) -> bool {
        let before = self.subcategories.len();
        self.subcategories
            .retain(|e| e.path.as_str() != path.as_str());
        before != self.subcategories.len()
    }

    /// Sort entries by path so the serialized form is deterministic
    pub fn normalize(&mut self) {
        self.memories.sort_by(|a, b| a.path.cmp(&b.path));
        self.subcategories.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Order entries newest first; entries without `updated_at` go last
pub fn sort_by_recency(entries: &mut [MemoryEntry]) {
    entries.sort_by(|a, b| match (a.updated_at, b.updated_at) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.path.cmp(&b.path)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.path.cmp(&b.path),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(path: &str, updated_at: Option<DateTime<Utc>>) -> MemoryEntry {
        MemoryEntry {
            path: MemoryPath::parse(path).unwrap(),
            token_estimate: 3,
            updated_at,
            tags: vec![],
        }
    }

    #[test]
    fn test_repeated_upsert_keeps_one_entry() {
        let mut index = CategoryIndex::default();
        for i in 0..5 {
            // A fresh path instance every time
            let mut e = entry("docs/setup", None);
            e.token_estimate = i;
            index.upsert_memory(e);
        }
        assert_eq!(index.memories.len(), 1);
        assert_eq!(index.memories[0].token_estimate, 4);
    }

    #[test]
    fn test_upsert_keeps_sorted() {
        let mut index = CategoryIndex::default();
        index.upsert_memory(entry("docs/zeta", None));
        index.upsert_memory(entry("docs/alpha", None));
        let paths: Vec<_> = index.memories.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/alpha", "docs/zeta"]);
    }

    #[test]
    fn test_subcategory_count_preserves_description() {
        let mut index = CategoryIndex::default();
        let guides = CategoryPath::parse("docs/guides").unwrap();
        index.set_subcategory_count(&guides, 0);
        assert!(index.set_subcategory_description(&guides, Some("How-tos".to_string())));
        index.set_subcategory_count(&CategoryPath::parse("docs/guides").unwrap(), 4);

        assert_eq!(index.subcategories.len(), 1);
        let sub = index.subcategory(&guides).unwrap();
        assert_eq!(sub.memory_count, 4);
        assert_eq!(sub.description.as_deref(), Some("How-tos"));
    }

    #[test]
    fn test_remove_entries() {
        let mut index = CategoryIndex::default();
        index.upsert_memory(entry("a", None));
        assert!(index.remove_memory(&MemoryPath::parse("a").unwrap()));
        assert!(!index.remove_memory(&MemoryPath::parse("a").unwrap()));
        assert!(!index.set_subcategory_description(&CategoryPath::parse("x").unwrap(), None));
    }

    #[test]
    fn test_recency_puts_missing_timestamp_last() {
        let older = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut entries = vec![
            entry("notes/stale", None),
            entry("notes/old", Some(older)),
            entry("notes/new", Some(newer)),
        ];
        sort_by_recency(&mut entries);
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["notes/new", "notes/old", "notes/stale"]);
    }

    #[test]
    fn test_yaml_omits_absent_updated_at() {
        let mut index = CategoryIndex::default();
        index.upsert_memory(entry("notes/stale", None));
        let yaml = serde_yaml::to_string(&index).unwrap();
        assert!(!yaml.contains("updated_at"));
        let back: CategoryIndex = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, index);
    }
}
