//! Cortex configuration management
//!
//! One TOML file maps store names to absolute roots and carries global
//! settings:
//!
//! ```toml
//! [settings]
//! output_format = "yaml"
//! strict_local = false
//! default_store = "global"
//!
//! [stores.global]
//! path = "/home/me/.config/cortex/memory"
//! category_mode = "free"
//!
//! [stores.global.categories.human]
//! description = "Facts about the user"
//! ```

use crate::domain::Store;
use crate::error::{Error, Result};
use crate::identity::Slug;
use crate::policy::{CategoryMode, PolicyTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the store created when no configuration exists yet
pub const DEFAULT_STORE_NAME: &str = "global";

/// Main Cortex configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CortexConfig {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Registered stores by name
    #[serde(default)]
    pub stores: BTreeMap<String, StoreDefinition>,
}

impl Default for CortexConfig {
    fn default() -> Self {
        let mut stores = BTreeMap::new();
        if let Some(root) = Self::default_global_root() {
            stores.insert(
                DEFAULT_STORE_NAME.to_string(),
                StoreDefinition {
                    path: root,
                    description: Some("Default global memory store".to_string()),
                    category_mode: CategoryMode::Free,
                    categories: PolicyTree::default(),
                },
            );
        }
        Self {
            settings: Settings::default(),
            stores,
        }
    }
}

impl CortexConfig {
    /// An empty configuration with default settings and no stores
    pub fn empty() -> Self {
        Self {
            settings: Settings::default(),
            stores: BTreeMap::new(),
        }
    }

    /// Default config file location (<config dir>/cortex/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("cortex").join("config.toml"))
    }

    /// Default root of the global store (<config dir>/cortex/memory)
    pub fn default_global_root() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("cortex").join("memory"))
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize configuration: {}", e)))
    }

    /// Check store names, roots and declared categories
    pub fn validate(&self) -> Result<()> {
        if self.settings.default_store.is_empty() {
            return Err(Error::Config("settings.default_store must not be empty".to_string()));
        }
        for (name, def) in &self.stores {
            def.to_store(name)
                .map_err(|e| Error::Config(format!("store '{}': {}", name, e)))?;
        }
        Ok(())
    }

    /// Known store names, sorted
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }
}

/// Output shape for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "yaml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Global settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Default output shape
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Refuse to fall back to the registry when no local store exists
    #[serde(default)]
    pub strict_local: bool,

    /// Store used when neither an explicit nor a local store applies
    #[serde(default = "default_store_name")]
    pub default_store: String,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Yaml,
            strict_local: false,
            default_store: default_store_name(),
        }
    }
}

/// One registered store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDefinition {
    /// Absolute root directory
    pub path: PathBuf,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category creation mode
    #[serde(default)]
    pub category_mode: CategoryMode,

    /// Declared categories and their policies
    #[serde(default, skip_serializing_if = "PolicyTree::is_empty")]
    pub categories: PolicyTree,
}

impl StoreDefinition {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            description: None,
            category_mode: CategoryMode::default(),
            categories: PolicyTree::default(),
        }
    }

    /// Build the validated store entity
    pub fn to_store(&self, name: &str) -> Result<Store> {
        Slug::new(name)?;
        Store::new(name, self.path.clone())?
            .with_description(self.description.clone())
            .with_category_mode(self.category_mode)
            .with_categories(self.categories.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CortexConfig::default();
        assert_eq!(config.settings.output_format, OutputFormat::Yaml);
        assert!(!config.settings.strict_local);
        assert_eq!(config.settings.default_store, DEFAULT_STORE_NAME);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[settings]
output_format = "json"
strict_local = true

[stores.work]
path = "/srv/cortex/work"
description = "Work notes"
category_mode = "subcategories"

[stores.work.categories.standards]
description = "Coding standards"
[stores.work.categories.standards.policy]
default_ttl_days = 90
"#;
        let config = CortexConfig::from_toml(content).unwrap();
        assert_eq!(config.settings.output_format, OutputFormat::Json);
        assert!(config.settings.strict_local);
        assert_eq!(config.settings.default_store, "global");

        let store = config.stores["work"].to_store("work").unwrap();
        assert_eq!(store.category_mode(), CategoryMode::Subcategories);
        assert!(store
            .categories()
            .is_declared(&crate::identity::CategoryPath::parse("standards").unwrap()));
    }

    #[test]
    fn test_relative_store_path_rejected() {
        let content = r#"
[stores.notes]
path = "notes"
"#;
        let err = CortexConfig::from_toml(content).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_invalid_store_name_rejected() {
        let content = r#"
[stores."Not Valid"]
path = "/tmp/x"
"#;
        assert!(CortexConfig::from_toml(content).is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = CortexConfig::empty();
        let mut def = StoreDefinition::new("/data/notes");
        def.description = Some("Notes".to_string());
        config.stores.insert("notes".to_string(), def);

        let rendered = config.to_toml().unwrap();
        let back = CortexConfig::from_toml(&rendered).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = CortexConfig::from_toml("").unwrap();
        assert!(config.stores.is_empty());
        assert_eq!(config.settings, Settings::default());
    }
}
