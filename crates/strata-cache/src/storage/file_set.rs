//! One cache file per decimation level.

use super::file::CacheFile;
use crate::error::Result;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_core::{DecimationLevel, LevelTable};

/// Which write path a file set serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileSetKind {
    /// Interactive updates on the calling thread.
    Sync,
    /// Full background rebuilds.
    Async,
}

/// SUBNUM float-sample files, index `i` holding level `i`.
#[derive(Debug)]
pub struct FileSet {
    kind: FileSetKind,
    generation: u64,
    files: Vec<Arc<CacheFile>>,
}

impl FileSet {
    /// Open one file per level. All-or-nothing: if any level fails, the files
    /// already opened are removed before the error is returned.
    pub(crate) fn create(
        kind: FileSetKind,
        table: &LevelTable,
        channels: usize,
        dir: &Path,
    ) -> Result<Self> {
        let set = Self::create_with(kind, table, |level| {
            CacheFile::create(dir, level.index, channels, level.rate)
        })?;
        tracing::debug!(
            "Created {:?} cache file set #{} ({} levels, {} channels) in {}",
            kind,
            set.generation,
            set.files.len(),
            channels,
            dir.display()
        );
        Ok(set)
    }

    fn create_with<F>(kind: FileSetKind, table: &LevelTable, mut open: F) -> Result<Self>
    where
        F: FnMut(&DecimationLevel) -> Result<CacheFile>,
    {
        static GENERATION: AtomicU64 = AtomicU64::new(1);

        let mut files: Vec<Arc<CacheFile>> = Vec::with_capacity(table.num_levels());
        for level in table.levels() {
            match open(level) {
                Ok(file) => files.push(Arc::new(file)),
                Err(e) => {
                    for file in &files {
                        if let Err(cleanup) = file.close() {
                            tracing::warn!(
                                "Failed to remove {} after open failure: {}",
                                file.path().display(),
                                cleanup
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            kind,
            generation: GENERATION.fetch_add(1, Ordering::Relaxed),
            files,
        })
    }

    pub fn kind(&self) -> FileSetKind {
        self.kind
    }

    /// Process-unique id, distinguishing successive sets of the same kind.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn file(&self, level: usize) -> &Arc<CacheFile> {
        &self.files[level]
    }

    pub fn files(&self) -> &[Arc<CacheFile>] {
        &self.files
    }

    pub fn is_deleted(&self) -> bool {
        self.files.iter().all(|f| f.is_closed())
    }

    /// Close and remove every file. Safe to call repeatedly.
    pub fn delete(&self) {
        for file in &self.files {
            if let Err(e) = file.close() {
                tracing::warn!("Failed to remove {}: {}", file.path().display(), e);
            }
        }
    }
}
