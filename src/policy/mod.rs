//! Category policy resolution
//!
//! Stores may declare a tree of categories, each optionally carrying a
//! [`CategoryPolicy`]. Resolving a target category walks its declared
//! ancestry and takes, per field, the value from the deepest category that
//! sets it. Categories with nothing declared along their path resolve to
//! fully permissive defaults.
//!
//! Resolution is pure. [`rules`] holds the two pipelines that consume a
//! [`ResolvedPolicy`]: validation (reject before mutating) and
//! transformation (clamp expiry).

pub mod rules;

pub use rules::{apply_ttl_ceiling, check, PolicyOperation};

use crate::domain::category::validate_description;
use crate::error::{Error, Result};
use crate::identity::{CategoryPath, Slug};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How strictly a store limits category creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMode {
    /// Any category may be created
    #[default]
    Free,
    /// Root-level categories must be declared; anything below is free
    Subcategories,
    /// Only declared categories may be created
    Strict,
}

impl std::fmt::Display for CategoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Subcategories => write!(f, "subcategories"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Per-operation permission overrides; `None` inherits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<bool>,
}

/// Rules declared on one category; every field inherits when unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// Expiry ceiling in days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl_days: Option<u32>,
    /// Maximum body length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_content_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_creation: Option<bool>,
    #[serde(default)]
    pub permissions: PermissionRules,
}

impl CategoryPolicy {
    fn validate(&self, path: &str) -> Result<()> {
        if self.default_ttl_days == Some(0) {
            return Err(Error::Config(format!(
                "category '{}': default_ttl_days must be at least 1",
                path
            )));
        }
        if self.max_content_length == Some(0) {
            return Err(Error::Config(format!(
                "category '{}': max_content_length must be at least 1",
                path
            )));
        }
        Ok(())
    }
}

/// A declared category in store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub policy: CategoryPolicy,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub subcategories: BTreeMap<String, CategoryDefinition>,
}

/// Effective rules for one category after inheritance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub default_ttl_days: Option<u32>,
    pub max_content_length: Option<usize>,
    pub can_create: bool,
    pub can_update: bool,
    pub can_delete: bool,
    pub subcategory_creation: bool,
}

impl Default for ResolvedPolicy {
    fn default() -> Self {
        Self {
            default_ttl_days: None,
            max_content_length: None,
            can_create: true,
            can_update: true,
            can_delete: true,
            subcategory_creation: true,
        }
    }
}

/// Declared category hierarchy of one store, keyed by root-level slug
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTree(BTreeMap<String, CategoryDefinition>);

impl PolicyTree {
    pub fn new(roots: BTreeMap<String, CategoryDefinition>) -> Self {
        Self(roots)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn roots(&self) -> &BTreeMap<String, CategoryDefinition> {
        &self.0
    }

    /// Check every key is a slug, every policy is sane and every
    /// description fits
    pub fn validate(&self) -> Result<()> {
        let mut stack: Vec<(String, &BTreeMap<String, CategoryDefinition>)> =
            vec![(String::new(), &self.0)];
        while let Some((prefix, level)) = stack.pop() {
            for (key, def) in level {
                Slug::new(key.as_str())
                    .map_err(|e| Error::Config(format!("declared category: {}", e)))?;
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}/{}", prefix, key)
                };
                def.policy.validate(&path)?;
                if let Some(desc) = &def.description {
                    validate_description(desc)
                        .map_err(|e| Error::Config(format!("category '{}': {}", path, e)))?;
                }
                stack.push((path, &def.subcategories));
            }
        }
        Ok(())
    }

    /// Definitions along `path`, root first, stopping at the first
    /// undeclared segment
    fn declared_chain(&self, path: &CategoryPath) -> Vec<&CategoryDefinition> {
        let mut chain = Vec::new();
        let mut level = &self.0;
        for segment in path.segments() {
            match level.get(segment.as_str()) {
                Some(def) => {
                    chain.push(def);
                    level = &def.subcategories;
                }
                None => break,
            }
        }
        chain
    }

    /// Definition of exactly `path`, if declared
    pub fn get(&self, path: &CategoryPath) -> Option<&CategoryDefinition> {
        if path.is_root() {
            return None;
        }
        let chain = self.declared_chain(path);
        if chain.len() == path.depth() {
            chain.last().copied()
        } else {
            None
        }
    }

    pub fn is_declared(&self, path: &CategoryPath) -> bool {
        self.get(path).is_some()
    }

    /// True when `path` is declared itself or has a declared descendant
    pub fn is_declared_or_ancestor(&self, path: &CategoryPath) -> bool {
        if path.is_root() {
            return !self.0.is_empty();
        }
        self.is_declared(path)
    }

    /// Walk from `path` up to the root; the deepest explicit value wins
    pub fn resolve(&self, path: &CategoryPath) -> ResolvedPolicy {
        let mut resolved = ResolvedPolicy::default();
        let mut ttl = None;
        let mut max_len = None;
        let mut create = None;
        let mut update = None;
        let mut delete = None;
        let mut subcategories = None;

        for def in self.declared_chain(path).into_iter().rev() {
            let p = &def.policy;
            ttl = ttl.or(p.default_ttl_days);
            max_len = max_len.or(p.max_content_length);
            create = create.or(p.permissions.create);
            update = update.or(p.permissions.update);
            delete = delete.or(p.permissions.delete);
            subcategories = subcategories.or(p.subcategory_creation);
        }

        resolved.default_ttl_days = ttl;
        resolved.max_content_length = max_len;
        resolved.can_create = create.unwrap_or(true);
        resolved.can_update = update.unwrap_or(true);
        resolved.can_delete = delete.unwrap_or(true);
        resolved.subcategory_creation = subcategories.unwrap_or(true);
        resolved
    }

    /// Whether a missing category at `path` may be created under `mode`.
    /// Returns the reason when it may not.
    pub fn creation_denied(&self, mode: CategoryMode, path: &CategoryPath) -> Option<String> {
        let declared = self.is_declared(path);
        match mode {
            CategoryMode::Strict if !declared => {
                return Some(format!(
                    "category mode 'strict' only allows declared categories; declare '{}' in the store configuration",
                    path
                ));
            }
            CategoryMode::Subcategories if path.depth() == 1 && !declared => {
                return Some(format!(
                    "category mode 'subcategories' requires root categories to be declared; declare '{}' or use an existing root",
                    path
                ));
            }
            _ => {}
        }
        if !declared {
            if let Some(parent) = path.parent() {
                if !parent.is_root() && !self.resolve(&parent).subcategory_creation {
                    return Some(format!(
                        "category '{}' does not allow new subcategories",
                        parent
                    ));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> CategoryPath {
        CategoryPath::parse(raw).unwrap()
    }

    fn tree() -> PolicyTree {
        let toml_str = r#"
[standards]
description = "Team standards"
[standards.policy]
default_ttl_days = 30
max_content_length = 2000
subcategory_creation = false
[standards.policy.permissions]
delete = false

[standards.subcategories.rust]
[standards.subcategories.rust.policy]
default_ttl_days = 7
[standards.subcategories.rust.policy.permissions]
delete = true

[standards.subcategories.rust.subcategories.errors]
"#;
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_undeclared_gets_permissive_defaults() {
        let resolved = tree().resolve(&path("scratch/ideas"));
        assert_eq!(resolved, ResolvedPolicy::default());
        assert_eq!(
            PolicyTree::default().resolve(&path("anything")),
            ResolvedPolicy::default()
        );
    }

    #[test]
    fn test_inherits_from_nearest_declaring_ancestor() {
        let t = tree();
        let errors = t.resolve(&path("standards/rust/errors"));
        assert_eq!(errors.default_ttl_days, Some(7));
        assert_eq!(errors.max_content_length, Some(2000));
        assert!(errors.can_delete);
        assert!(!errors.subcategory_creation);

        let top = t.resolve(&path("standards"));
        assert_eq!(top.default_ttl_days, Some(30));
        assert!(!top.can_delete);
        assert!(top.can_create);
    }

    #[test]
    fn test_undeclared_child_of_declared_inherits() {
        let resolved = tree().resolve(&path("standards/go"));
        assert_eq!(resolved.default_ttl_days, Some(30));
        assert!(!resolved.can_delete);
    }

    #[test]
    fn test_declared_lookup() {
        let t = tree();
        assert!(t.is_declared(&path("standards/rust/errors")));
        assert!(t.is_declared(&path("standards")));
        assert!(!t.is_declared(&path("standards/go")));
        assert!(t.is_declared_or_ancestor(&CategoryPath::root()));
        assert!(!PolicyTree::default().is_declared_or_ancestor(&CategoryPath::root()));
    }

    #[test]
    fn test_creation_modes() {
        let t = tree();
        assert!(t.creation_denied(CategoryMode::Free, &path("notes")).is_none());
        assert!(t
            .creation_denied(CategoryMode::Subcategories, &path("notes"))
            .is_some());
        assert!(t
            .creation_denied(CategoryMode::Subcategories, &path("notes/deep"))
            .is_none());
        assert!(t
            .creation_denied(CategoryMode::Strict, &path("standards/rust"))
            .is_none());
        assert!(t
            .creation_denied(CategoryMode::Strict, &path("standards/go"))
            .is_some());
    }

    #[test]
    fn test_subcategory_creation_blocks_undeclared_children() {
        let t = tree();
        let reason = t
            .creation_denied(CategoryMode::Free, &path("standards/go"))
            .unwrap();
        assert!(reason.contains("standards"));
        // declared children are still allowed
        assert!(t
            .creation_denied(CategoryMode::Free, &path("standards/rust"))
            .is_none());
    }

    #[test]
    fn test_validate_rejects_bad_declarations() {
        assert!(tree().validate().is_ok());

        let bad_key: PolicyTree = toml::from_str("[\"Bad Key\"]\n").unwrap();
        assert!(bad_key.validate().is_err());

        let zero_ttl: PolicyTree =
            toml::from_str("[notes.policy]\ndefault_ttl_days = 0\n").unwrap();
        assert!(zero_ttl.validate().is_err());
    }
}
