//! Memory entity
//!
//! A memory is a free-form text body plus metadata. Instances are only built
//! through [`MemoryBuilder`] or [`Memory::new`], both of which validate, and
//! only change through [`Memory::apply_update`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Tag set that keeps first-insertion order for display but compares as a set
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    /// Trim, drop duplicates (keeping the first occurrence) and reject blanks
    pub fn new<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.into().trim().to_string();
            if tag.is_empty() {
                return Err(Error::Validation("tags must not be empty strings".to_string()));
            }
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        Ok(Self(out))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|t| other.contains(t))
    }
}

impl Eq for Tags {}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        Tags::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Memory metadata carried in the document header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Tags,
    pub source: String,
    pub citations: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryMetadata {
    fn validate(&self) -> Result<()> {
        if self.updated_at < self.created_at {
            return Err(Error::Validation(format!(
                "updated_at ({}) must not be earlier than created_at ({})",
                self.updated_at.to_rfc3339(),
                self.created_at.to_rfc3339()
            )));
        }
        if self.citations.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::Validation(
                "citations must be non-empty file references or URLs".to_string(),
            ));
        }
        Ok(())
    }
}

/// A persisted unit of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    content: String,
    metadata: MemoryMetadata,
}

impl Memory {
    /// Validate and assemble a memory from its parts
    pub fn new(content: impl Into<String>, metadata: MemoryMetadata) -> Result<Self> {
        metadata.validate()?;
        Ok(Self {
            content: content.into(),
            metadata,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &MemoryMetadata {
        &self.metadata
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.expires_at
    }

    /// Expired when an expiry is set and is not in the future
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.metadata.expires_at.is_some_and(|at| at <= now)
    }

    /// Rough token count of the body
    pub fn token_estimate(&self) -> usize {
        estimate_tokens(&self.content)
    }

    /// Apply a partial update, refreshing `updated_at`
    pub fn apply_update(&self, update: &MemoryUpdate, now: DateTime<Utc>) -> Result<Memory> {
        let mut content = self.content.clone();
        let mut metadata = self.metadata.clone();

        match &update.content {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => content.clear(),
            FieldUpdate::Set(value) => content = value.clone(),
        }
        match &update.tags {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => metadata.tags = Tags::default(),
            FieldUpdate::Set(value) => metadata.tags = Tags::new(value.iter().cloned())?,
        }
        match &update.source {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => metadata.source.clear(),
            FieldUpdate::Set(value) => metadata.source = value.clone(),
        }
        match &update.citations {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => metadata.citations.clear(),
            FieldUpdate::Set(value) => metadata.citations = value.clone(),
        }
        match &update.expires_at {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => metadata.expires_at = None,
            FieldUpdate::Set(value) => metadata.expires_at = Some(*value),
        }

        metadata.updated_at = now.max(metadata.created_at);
        Memory::new(content, metadata)
    }

    /// Replace the expiry without touching other fields
    pub(crate) fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.metadata.expires_at = expires_at;
        self
    }
}

/// Token estimate used for index entries: one token per four characters
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Builder for constructing new `Memory` instances
pub struct MemoryBuilder {
    content: String,
    tags: Vec<String>,
    source: String,
    citations: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

impl MemoryBuilder {
    /// Create a new builder with the required content
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tags: Vec::new(),
            source: String::new(),
            citations: Vec::new(),
            expires_at: None,
            created_at: None,
        }
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add tags from an iterator
    pub fn tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Set the source
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Add a citation
    pub fn citation(mut self, citation: impl Into<String>) -> Self {
        self.citations.push(citation.into());
        self
    }

    /// Set the expiry instant
    pub fn expires_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = at;
        self
    }

    /// Set the creation instant (defaults to now)
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Build the memory; `updated_at` starts equal to `created_at`
    pub fn build(self) -> Result<Memory> {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let metadata = MemoryMetadata {
            created_at,
            updated_at: created_at,
            tags: Tags::new(self.tags)?,
            source: self.source,
            citations: self.citations,
            expires_at: self.expires_at,
        };
        Memory::new(self.content, metadata)
    }
}

/// Three-state update of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    /// Field absent from the update: keep the current value
    Keep,
    /// Field explicitly null: clear the current value
    Clear,
    /// Field present: replace the current value
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep)
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        Self::Keep
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

/// Absent keys come from `#[serde(default)]` (Keep); explicit `null` is Clear.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(FieldUpdate::from)
    }
}

/// Partial update payload for a memory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryUpdate {
    #[serde(default)]
    pub content: FieldUpdate<String>,
    #[serde(default)]
    pub tags: FieldUpdate<Vec<String>>,
    #[serde(default)]
    pub source: FieldUpdate<String>,
    #[serde(default)]
    pub citations: FieldUpdate<Vec<String>>,
    #[serde(default)]
    pub expires_at: FieldUpdate<DateTime<Utc>>,
}

impl MemoryUpdate {
    /// True when no field would change
    pub fn is_empty(&self) -> bool {
        self.content.is_keep()
            && self.tags.is_keep()
            && self.source.is_keep()
            && self.citations.is_keep()
            && self.expires_at.is_keep()
    }
}
