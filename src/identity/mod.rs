//! Identity and validation value types
//!
//! Pure, I/O-free types for addressing memories and categories.

pub mod path;
pub mod slug;

pub use path::{CategoryPath, MemoryPath};
pub use slug::Slug;
