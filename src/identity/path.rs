//! Category and memory path value types
//!
//! Both types compare, hash and order by their canonical joined string
//! (`a/b/c`), so two independently parsed copies of the same logical path
//! are always interchangeable as map keys and in index upserts.

use super::slug::Slug;
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Ordered sequence of slugs; zero segments is the root category
#[derive(Debug, Clone, Default)]
pub struct CategoryPath {
    segments: Vec<Slug>,
    joined: String,
}

impl CategoryPath {
    /// The root category
    pub fn root() -> Self {
        Self::default()
    }

    /// Build from already-validated segments
    pub fn from_segments(segments: Vec<Slug>) -> Self {
        let joined = segments
            .iter()
            .map(Slug::as_str)
            .collect::<Vec<_>>()
            .join("/");
        Self { segments, joined }
    }

    /// Parse `a/b/c`. Leading and trailing slashes are ignored; an empty
    /// string is the root category.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(Error::InvalidPath {
                    value: raw.to_string(),
                    reason: "path contains an empty segment".to_string(),
                });
            }
            let slug = Slug::new(part).map_err(|e| Error::InvalidPath {
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
            segments.push(slug);
        }
        Ok(Self::from_segments(segments))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Slug] {
        &self.segments
    }

    /// Last segment, `None` for the root category
    pub fn name(&self) -> Option<&Slug> {
        self.segments.last()
    }

    /// Parent category, `None` for the root category
    pub fn parent(&self) -> Option<CategoryPath> {
        if self.is_root() {
            return None;
        }
        Some(Self::from_segments(
            self.segments[..self.segments.len() - 1].to_vec(),
        ))
    }

    pub fn child(&self, slug: Slug) -> CategoryPath {
        let mut segments = self.segments.clone();
        segments.push(slug);
        Self::from_segments(segments)
    }

    /// Every proper ancestor prefix plus this path, shortest first, root excluded
    pub fn lineage(&self) -> Vec<CategoryPath> {
        (1..=self.segments.len())
            .map(|n| Self::from_segments(self.segments[..n].to_vec()))
            .collect()
    }

    /// True when `self` equals `other` or lies underneath it
    pub fn is_within(&self, other: &CategoryPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// Directory of this category below a store root
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in &self.segments {
            path.push(segment.as_str());
        }
        path
    }
}

impl PartialEq for CategoryPath {
    fn eq(&self, other: &Self) -> bool {
        self.joined == other.joined
    }
}

impl Eq for CategoryPath {}

impl Hash for CategoryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.joined.hash(state);
    }
}

impl PartialOrd for CategoryPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CategoryPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.joined.cmp(&other.joined)
    }
}

impl std::fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined)
    }
}

impl std::str::FromStr for CategoryPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CategoryPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined)
    }
}

impl<'de> Deserialize<'de> for CategoryPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Containing category plus the memory's own slug
#[derive(Debug, Clone)]
pub struct MemoryPath {
    category: CategoryPath,
    slug: Slug,
    joined: String,
}

impl MemoryPath {
    pub fn new(category: CategoryPath, slug: Slug) -> Self {
        let joined = if category.is_root() {
            slug.as_str().to_string()
        } else {
            format!("{}/{}", category.as_str(), slug)
        };
        Self {
            category,
            slug,
            joined,
        }
    }

    /// Parse `category/sub/slug`; a single segment is a root-level memory
    pub fn parse(raw: &str) -> Result<Self> {
        let category = CategoryPath::parse(raw)?;
        let mut segments = category.segments().to_vec();
        let slug = segments.pop().ok_or_else(|| Error::InvalidPath {
            value: raw.to_string(),
            reason: "memory path needs at least one segment".to_string(),
        })?;
        Ok(Self::new(CategoryPath::from_segments(segments), slug))
    }

    pub fn category(&self) -> &CategoryPath {
        &self.category
    }

    pub fn slug(&self) -> &Slug {
        &self.slug
    }

    pub fn as_str(&self) -> &str {
        &self.joined
    }

    /// Document file of this memory below a store root
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        self.category
            .to_fs_path(root)
            .join(format!("{}.md", self.slug))
    }
}

impl PartialEq for MemoryPath {
    fn eq(&self, other: &Self) -> bool {
        self.joined == other.joined
    }
}

impl Eq for MemoryPath {}

impl Hash for MemoryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.joined.hash(state);
    }
}

impl PartialOrd for MemoryPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MemoryPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.joined.cmp(&other.joined)
    }
}

impl std::fmt::Display for MemoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.joined)
    }
}

impl std::str::FromStr for MemoryPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for MemoryPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined)
    }
}

impl<'de> Deserialize<'de> for MemoryPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
