//! Domain entities: memories, categories, stores and their index summaries

pub mod category;
pub mod index;
pub mod memory;
pub mod store;

pub use category::{Category, MAX_DESCRIPTION_LEN};
pub use index::{CategoryIndex, MemoryEntry, SubcategoryEntry};
pub use memory::{FieldUpdate, Memory, MemoryBuilder, MemoryMetadata, MemoryUpdate, Tags};
pub use store::Store;
