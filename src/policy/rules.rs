//! Policy validation and transformation pipelines
//!
//! `check` only decides whether an operation may proceed and never alters
//! data. `apply_ttl_ceiling` only reshapes data and never refuses.

use super::ResolvedPolicy;
use crate::domain::memory::Memory;
use crate::error::{Error, Result};
use crate::identity::CategoryPath;
use chrono::{DateTime, Duration, Utc};

/// A mutation about to be applied to a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOperation {
    /// New memory with a body of `content_len` characters
    CreateMemory { content_len: usize },
    /// Memory update; `content_len` is set when the body changes
    UpdateMemory { content_len: Option<usize> },
    DeleteMemory,
    /// Description change on the category itself
    SetDescription,
}

/// Reject `op` on `category` when the resolved policy disallows it
pub fn check(category: &CategoryPath, policy: &ResolvedPolicy, op: PolicyOperation) -> Result<()> {
    let deny = |reason: String| {
        Err(Error::PolicyViolation {
            path: category.to_string(),
            reason,
        })
    };

    match op {
        PolicyOperation::CreateMemory { content_len } => {
            if !policy.can_create {
                return deny("creating memories is disabled by the category policy".to_string());
            }
            check_length(category, policy, content_len)
        }
        PolicyOperation::UpdateMemory { content_len } => {
            if !policy.can_update {
                return deny("updating memories is disabled by the category policy".to_string());
            }
            match content_len {
                Some(len) => check_length(category, policy, len),
                None => Ok(()),
            }
        }
        PolicyOperation::DeleteMemory => {
            if !policy.can_delete {
                return deny("deleting memories is disabled by the category policy".to_string());
            }
            Ok(())
        }
        PolicyOperation::SetDescription => {
            if !policy.can_update {
                return deny(
                    "updates, including description changes, are disabled by the category policy"
                        .to_string(),
                );
            }
            Ok(())
        }
    }
}

fn check_length(category: &CategoryPath, policy: &ResolvedPolicy, len: usize) -> Result<()> {
    match policy.max_content_length {
        Some(max) if len > max => Err(Error::Validation(format!(
            "content is {} characters but category '{}' allows at most {}; shorten the content or store it elsewhere",
            len, category, max
        ))),
        _ => Ok(()),
    }
}

/// Clamp the memory's expiry to `now + default_ttl_days`. A memory with no
/// expiry under a TTL ceiling receives the ceiling.
pub fn apply_ttl_ceiling(memory: Memory, policy: &ResolvedPolicy, now: DateTime<Utc>) -> Memory {
    let Some(days) = policy.default_ttl_days else {
        return memory;
    };
    let ceiling = now + Duration::days(i64::from(days));
    let effective = match memory.expires_at() {
        Some(explicit) => explicit.min(ceiling),
        None => ceiling,
    };
    memory.with_expires_at(Some(effective))
}
