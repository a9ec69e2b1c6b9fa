//! Store entity
//!
//! A store is a named memory collection rooted at an absolute directory.

use crate::error::{Error, Result};
use crate::identity::Slug;
use crate::policy::{CategoryMode, PolicyTree};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A named, rooted collection of categories and memories
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Store {
    name: Slug,
    root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    category_mode: CategoryMode,
    #[serde(skip_serializing_if = "PolicyTree::is_empty")]
    categories: PolicyTree,
}

impl Store {
    /// Validate the name and root and build a store with no declarations
    pub fn new(name: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let name = Slug::new(name).map_err(|e| Error::Validation(format!("store name: {}", e)))?;
        if !root.is_absolute() {
            return Err(Error::Validation(format!(
                "store '{}' path '{}' must be absolute",
                name,
                root.display()
            )));
        }
        Ok(Self {
            name,
            root,
            description: None,
            category_mode: CategoryMode::default(),
            categories: PolicyTree::default(),
        })
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_category_mode(mut self, mode: CategoryMode) -> Self {
        self.category_mode = mode;
        self
    }

    pub fn with_categories(mut self, categories: PolicyTree) -> Result<Self> {
        categories.validate()?;
        self.categories = categories;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category_mode(&self) -> CategoryMode {
        self.category_mode
    }

    pub fn categories(&self) -> &PolicyTree {
        &self.categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_absolute_root() {
        assert!(Store::new("notes", "/var/lib/cortex/notes").is_ok());
        let err = Store::new("notes", "relative/notes").unwrap_err();
        assert!(err.to_string().contains("must be absolute"));
    }

    #[test]
    fn test_requires_slug_name() {
        assert!(Store::new("My Store", "/tmp/x").is_err());
    }

    #[test]
    fn test_builder_style_setters() {
        let store = Store::new("work", "/srv/work")
            .unwrap()
            .with_description(Some("Work notes".to_string()))
            .with_category_mode(CategoryMode::Strict);
        assert_eq!(store.name(), "work");
        assert_eq!(store.description(), Some("Work notes"));
        assert_eq!(store.category_mode(), CategoryMode::Strict);
        assert!(store.categories().is_empty());
    }
}
