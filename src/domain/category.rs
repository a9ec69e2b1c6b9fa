//! Category entity

use super::index::{CategoryIndex, MemoryEntry, SubcategoryEntry};
use crate::error::{Error, Result};
use crate::identity::CategoryPath;
use serde::Serialize;

/// Maximum category description length in characters
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Check a category description fits the length limit
pub fn validate_description(description: &str) -> Result<()> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(Error::Validation(format!(
            "description is {} characters; the limit is {}",
            len, MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

/// A node in the category hierarchy, as seen through its index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub path: CategoryPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub memories: Vec<MemoryEntry>,
    pub subcategories: Vec<SubcategoryEntry>,
}

impl Category {
    /// Assemble from the category's own index plus the description held in
    /// its parent's index
    pub fn from_index(path: CategoryPath, description: Option<String>, index: CategoryIndex) -> Self {
        Self {
            path,
            description,
            memories: index.memories,
            subcategories: index.subcategories,
        }
    }

    /// Root and root-level categories have no parent index able to hold a
    /// description and may not be deleted
    pub fn is_protected_root(path: &CategoryPath) -> bool {
        path.depth() <= 1
    }
}
