//! Merge diff for cached collections.
//!
//! Records are matched by [`CacheEntity::natural_key`], never by row id, and
//! with multiset semantics: each record of the subtrahend cancels at most one
//! equal record of the minuend. Duplicate rows therefore collapse one-for-one
//! on the next merge.

use std::collections::HashMap;

use schoolsync_core::CacheEntity;

/// Records of `a` not matched in `b`, in `a`'s order.
pub fn unique_subtract<T: CacheEntity>(a: &[T], b: &[T]) -> Vec<T> {
    let mut budget: HashMap<T::NaturalKey, usize> = HashMap::with_capacity(b.len());
    for item in b {
        *budget.entry(item.natural_key()).or_insert(0) += 1;
    }

    let mut out = Vec::with_capacity(a.len());
    for item in a {
        match budget.get_mut(&item.natural_key()) {
            Some(left) if *left > 0 => *left -= 1,
            _ => out.push(item.clone()),
        }
    }
    out
}

/// What a merge has to write: rows to delete and rows to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan<T> {
    pub removed: Vec<T>,
    pub added: Vec<T>,
}

impl<T> MergePlan<T> {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// `removed = old \ new`, `added = new \ old`.
pub fn merge_plan<T: CacheEntity>(old: &[T], new: &[T]) -> MergePlan<T> {
    MergePlan {
        removed: unique_subtract(old, new),
        added: unique_subtract(new, old),
    }
}
