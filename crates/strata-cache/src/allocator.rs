//! Stake allocation for the two write paths.
//!
//! Interactive updates and background rebuilds each reserve ranges in their
//! own file set, so a running rebuild never moves the cursors an edit is
//! writing behind.

use crate::error::Result;
use crate::stake::DecimatedStake;
use crate::storage::{CacheStorage, FileSetKind, FileSetSlot};
use strata_core::Span;

/// Reserve a stake for an interactive update.
///
/// # Panics
/// Panics if `slot` is not the sync slot.
pub fn alloc(storage: &CacheStorage, slot: &mut FileSetSlot, span: Span) -> Result<DecimatedStake> {
    assert_eq!(
        slot.kind(),
        FileSetKind::Sync,
        "BUG: sync allocation requires the sync slot lock"
    );
    storage.allocate(slot, span)
}

/// Reserve a stake for the background rebuild.
///
/// # Panics
/// Panics if `slot` is not the async slot.
pub fn alloc_async(
    storage: &CacheStorage,
    slot: &mut FileSetSlot,
    span: Span,
) -> Result<DecimatedStake> {
    assert_eq!(
        slot.kind(),
        FileSetKind::Async,
        "BUG: async allocation requires the async slot lock"
    );
    storage.allocate(slot, span)
}
