//! Cortex error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coarse classification of an error by origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; fix the input and call again
    Validation,
    /// The requested memory, category or store does not exist
    NotFound,
    /// The target is protected by the store layout or its policy
    Protected,
    /// Filesystem or format failure
    Storage,
    /// The primary write landed but a follow-up index update did not
    PartialSuccess,
}

/// Cortex error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid slug segment
    #[error("Invalid slug '{value}': {reason}. Use lowercase letters, digits and single hyphens (e.g. 'project-notes')")]
    InvalidSlug { value: String, reason: String },

    /// Invalid category or memory path
    #[error("Invalid path '{value}': {reason}")]
    InvalidPath { value: String, reason: String },

    /// Generic input validation failure
    #[error("Validation error: {0}")]
    Validation(String),

    /// Memory does not exist
    #[error("Memory '{path}' not found. Check the path with `cortex memory list`")]
    MemoryNotFound { path: String },

    /// Memory already exists at the target path
    #[error("Memory '{path}' already exists. Use `cortex memory update` to change it")]
    MemoryExists { path: String },

    /// Category does not exist
    #[error("Category '{path}' not found (missing segment '{missing}'). Create it first with `cortex category create {missing}`")]
    CategoryNotFound { path: String, missing: String },

    /// Store is not registered or the registry was not loaded
    #[error("Store '{name}' not found. Known stores: [{}]", .known.join(", "))]
    StoreNotFound { name: String, known: Vec<String> },

    /// Operation targets a protected category
    #[error("Category '{path}' is protected: {reason}")]
    Protected { path: String, reason: String },

    /// Operation is disallowed by the category policy
    #[error("Policy violation on '{path}': {reason}")]
    PolicyViolation { path: String, reason: String },

    /// Filesystem failure, carrying the attempted path
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document or index file could not be parsed
    #[error("Failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    /// First step of a multi-step write succeeded, a later one failed
    #[error("{operation} on '{path}' partially succeeded ({completed}) but the index update failed: {source}. Run `cortex store reindex` to repair the index")]
    PartialSuccess {
        operation: &'static str,
        path: String,
        completed: String,
        #[source]
        source: Box<Error>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Strict-local resolution found no local store
    #[error("No local store found in {} and strict_local forbids falling back to the global registry. Run `cortex store init --local` in this directory", .dir.display())]
    LocalStoreMissing { dir: PathBuf },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSlug { .. } => "INVALID_SLUG",
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MemoryNotFound { .. } => "MEMORY_NOT_FOUND",
            Self::MemoryExists { .. } => "MEMORY_EXISTS",
            Self::CategoryNotFound { .. } => "CATEGORY_NOT_FOUND",
            Self::StoreNotFound { .. } => "STORE_NOT_FOUND",
            Self::Protected { .. } => "PROTECTED",
            Self::PolicyViolation { .. } => "POLICY_VIOLATION",
            Self::Io { .. } => "STORAGE_IO",
            Self::Parse { .. } => "PARSE_ERROR",
            Self::PartialSuccess { .. } => "PARTIAL_SUCCESS",
            Self::Config(_) => "CONFIG_ERROR",
            Self::LocalStoreMissing { .. } => "LOCAL_STORE_MISSING",
            Self::Serialization(_) | Self::Yaml(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Classify the error by origin
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSlug { .. }
            | Self::InvalidPath { .. }
            | Self::Validation(_)
            | Self::MemoryExists { .. }
            | Self::Config(_) => ErrorKind::Validation,
            Self::MemoryNotFound { .. }
            | Self::CategoryNotFound { .. }
            | Self::StoreNotFound { .. }
            | Self::LocalStoreMissing { .. } => ErrorKind::NotFound,
            Self::Protected { .. } | Self::PolicyViolation { .. } => ErrorKind::Protected,
            Self::Io { .. } | Self::Parse { .. } | Self::Serialization(_) | Self::Yaml(_) => {
                ErrorKind::Storage
            }
            Self::PartialSuccess { .. } => ErrorKind::PartialSuccess,
        }
    }

    /// Wrap an IO error with the path that was being touched
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a follow-up failure after the primary write landed
    pub fn partial(
        operation: &'static str,
        path: impl std::fmt::Display,
        completed: impl Into<String>,
        source: Error,
    ) -> Self {
        Self::PartialSuccess {
            operation,
            path: path.to_string(),
            completed: completed.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for Cortex operations
pub type Result<T> = std::result::Result<T, Error>;
