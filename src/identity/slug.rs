//! Slug value type
//!
//! A slug is one validated path segment: lowercase ASCII letters and digits
//! in runs separated by single hyphens.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::OnceLock;

/// Maximum slug length in bytes. A memory file is `<slug>.md`, and common
/// filesystems cap a file name at 255 bytes.
pub const MAX_SLUG_LEN: usize = 252;

fn slug_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static slug regex"))
}

/// A single validated path segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slug(String);

impl Slug {
    /// Validate and wrap a raw segment
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidSlug {
                value,
                reason: "slug must not be empty".to_string(),
            });
        }
        if value.len() > MAX_SLUG_LEN {
            return Err(Error::InvalidSlug {
                reason: format!("slug is longer than {} bytes", MAX_SLUG_LEN),
                value,
            });
        }
        if !slug_pattern().is_match(&value) {
            return Err(Error::InvalidSlug {
                value,
                reason: "slug contains characters outside [a-z0-9-] or misplaced hyphens"
                    .to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Convert free text into a slug ("My Notes!" -> "my-notes")
    pub fn slugify(input: &str) -> Result<Self> {
        let mut out = String::with_capacity(input.len());
        let mut pending_hyphen = false;
        for ch in input.chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(ch.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }
        out.truncate(MAX_SLUG_LEN);
        let trimmed = out.trim_end_matches('-').to_string();
        if trimmed.is_empty() {
            return Err(Error::InvalidSlug {
                value: input.to_string(),
                reason: "text has no letters or digits to build a slug from".to_string(),
            });
        }
        Self::new(trimmed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Slug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Slug {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        for raw in ["a", "setup", "project-notes", "v2", "a-b-c-1"] {
            assert!(Slug::new(raw).is_ok(), "{} should be valid", raw);
        }
    }

    #[test]
    fn test_invalid_slugs() {
        for raw in ["", "Setup", "-lead", "trail-", "double--hyphen", "with space", "a/b", "ünï"] {
            let err = Slug::new(raw).unwrap_err();
            assert_eq!(err.code(), "INVALID_SLUG", "{} should be rejected", raw);
        }
    }

    #[test]
    fn test_length_limit() {
        assert!(Slug::new("a".repeat(65)).is_ok());
        assert!(Slug::new("a".repeat(MAX_SLUG_LEN)).is_ok());
        let err = Slug::new("a".repeat(MAX_SLUG_LEN + 1)).unwrap_err();
        assert_eq!(err.code(), "INVALID_SLUG");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Slug::slugify("My Notes!").unwrap().as_str(), "my-notes");
        assert_eq!(Slug::slugify("  API -- keys  ").unwrap().as_str(), "api-keys");
        assert_eq!(Slug::slugify("Rust_2024").unwrap().as_str(), "rust-2024");
        assert!(Slug::slugify("!!!").is_err());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        let ok: Slug = serde_json::from_str("\"notes\"").unwrap();
        assert_eq!(ok.as_str(), "notes");
        assert!(serde_json::from_str::<Slug>("\"Not A Slug\"").is_err());
    }
}
