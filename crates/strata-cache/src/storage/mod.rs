//! Cache storage manager.
//!
//! Owns two independent file-set slots, one per write path:
//! - **Sync**: stakes reserved by interactive updates on the caller's thread
//! - **Async**: stakes reserved by the background rebuild
//!
//! Each slot holds the current [`FileSet`] (created lazily) and one monotonic
//! write cursor per level. Allocation reads a cursor and advances it, so the
//! slot mutex only needs to be held for the reservation itself; the reserved
//! ranges are filled later without any lock.

mod file;
mod file_set;

pub use file::CacheFile;
pub use file_set::{FileSet, FileSetKind};

use crate::error::Result;
use crate::stake::DecimatedStake;
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_core::{LevelTable, Span};

/// One slot's current file set and per-level write cursors.
///
/// Only reachable through [`CacheStorage::lock`], so a `&mut FileSetSlot`
/// proves the slot lock is held.
#[derive(Debug)]
pub struct FileSetSlot {
    kind: FileSetKind,
    set: Option<Arc<FileSet>>,
    cursors: Vec<u64>,
}

impl FileSetSlot {
    fn new(kind: FileSetKind, levels: usize) -> Self {
        Self {
            kind,
            set: None,
            cursors: vec![0; levels],
        }
    }

    pub fn kind(&self) -> FileSetKind {
        self.kind
    }

    /// Current file set, if one has been opened.
    pub fn file_set(&self) -> Option<&Arc<FileSet>> {
        self.set.as_ref()
    }

    /// Next free frame at each level.
    pub fn cursors(&self) -> &[u64] {
        &self.cursors
    }

    fn reset(&mut self) -> Option<Arc<FileSet>> {
        self.cursors.iter_mut().for_each(|c| *c = 0);
        self.set.take()
    }
}

/// Per-level temp-file storage for one decimated trail.
pub struct CacheStorage {
    table: Arc<LevelTable>,
    channels: usize,
    dir: PathBuf,
    sync_slot: Mutex<FileSetSlot>,
    async_slot: Mutex<FileSetSlot>,
}

impl CacheStorage {
    /// `channels` is the decimated channel count written per frame.
    pub fn new(table: Arc<LevelTable>, channels: usize, dir: PathBuf) -> Self {
        let levels = table.num_levels();
        Self {
            table,
            channels,
            dir,
            sync_slot: Mutex::new(FileSetSlot::new(FileSetKind::Sync, levels)),
            async_slot: Mutex::new(FileSetSlot::new(FileSetKind::Async, levels)),
        }
    }

    pub fn table(&self) -> &Arc<LevelTable> {
        &self.table
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lock a slot. Hold the guard only across allocation.
    pub fn lock(&self, kind: FileSetKind) -> MutexGuard<'_, FileSetSlot> {
        match kind {
            FileSetKind::Sync => self.sync_slot.lock(),
            FileSetKind::Async => self.async_slot.lock(),
        }
    }

    /// The slot's file set, creating it on first use.
    pub fn open_or_create(&self, slot: &mut FileSetSlot) -> Result<Arc<FileSet>> {
        if let Some(set) = &slot.set {
            return Ok(Arc::clone(set));
        }
        let set = Arc::new(FileSet::create(
            slot.kind,
            &self.table,
            self.channels,
            &self.dir,
        )?);
        slot.set = Some(Arc::clone(&set));
        Ok(set)
    }

    /// Reserve file ranges for `span` at every level.
    ///
    /// The span is extended to coarsest-level boundaries; level `i` gets
    /// `extended.len() >> shift_i` frames starting at its cursor, and the
    /// cursor advances by that length.
    pub fn allocate(&self, slot: &mut FileSetSlot, span: Span) -> Result<DecimatedStake> {
        let set = self.open_or_create(slot)?;
        let extended = self.table.extend(span);

        let file_spans: Vec<Span> = self
            .table
            .levels()
            .iter()
            .zip(slot.cursors.iter_mut())
            .map(|(level, cursor)| {
                let file_span = Span::with_len(*cursor, level.decimated_len(extended.len()));
                *cursor = file_span.stop();
                file_span
            })
            .collect();

        tracing::debug!(
            "Allocated {:?} stake {} (requested {}), level 0 at {}",
            slot.kind,
            extended,
            span,
            file_spans[0]
        );

        Ok(DecimatedStake::new(
            extended,
            span,
            set,
            file_spans,
            Arc::clone(&self.table),
        ))
    }

    /// Detach the slot's current set and open a fresh one.
    ///
    /// The detached set is not deleted: committed stakes may still read from
    /// it, and its files go away when the last of them is dropped.
    pub fn replace(&self, slot: &mut FileSetSlot) -> Result<Arc<FileSet>> {
        if let Some(old) = slot.reset() {
            tracing::debug!(
                "Detached {:?} cache file set #{}",
                slot.kind,
                old.generation()
            );
        }
        self.open_or_create(slot)
    }

    /// Close and remove the slot's files and reset its cursors. No-op when
    /// the slot is empty.
    pub fn delete(&self, slot: &mut FileSetSlot) {
        if let Some(set) = slot.reset() {
            set.delete();
            tracing::debug!(
                "Deleted {:?} cache file set #{}",
                slot.kind,
                set.generation()
            );
        }
    }

    pub fn delete_all(&self) {
        self.delete(&mut self.sync_slot.lock());
        self.delete(&mut self.async_slot.lock());
    }
}
