//! Cortex - hierarchical, file-backed memory store
//!
//! Memories are markdown documents with a YAML metadata header, organized
//! in a tree of categories. Every category directory carries an index file
//! summarizing its direct memories and subcategories, kept in agreement with
//! the files on disk by incremental updates and repaired by a full reindex.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       cortex CLI                             │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  Registry ── StoreResolver (explicit → local → default)      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ Store
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  StoreClient ── CategoryClient / MemoryClient                │
//! │     policy check → TTL ceiling → storage port                │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ MemoryStorage / IndexStorage /
//!                                │ CategoryStorage
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  FilesystemStorage                                           │
//! │     <root>/<category>/index.yaml, <root>/<category>/<slug>.md│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`identity`]: slugs and category/memory paths
//! - [`domain`]: memories, categories, indexes and stores
//! - [`policy`]: category modes and inherited category policies
//! - [`storage`]: storage ports and the filesystem engine
//! - [`registry`]: store registry and store resolution
//! - [`client`]: policy-enforcing facade over one store
//! - [`config`]: configuration management

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod policy;
pub mod registry;
pub mod storage;

pub use client::{CategoryClient, MemoryClient, MemoryRecord, StoreClient};
pub use config::CortexConfig;
pub use error::{Error, ErrorKind, Result};
pub use identity::{CategoryPath, MemoryPath, Slug};
pub use registry::{Registry, StoreResolver};
