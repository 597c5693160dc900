//! Reserved per-level file ranges for one source span.

use crate::storage::{CacheFile, FileSet};
use std::sync::Arc;
use strata_core::{LevelTable, Span};

/// A source span plus the file range reserved for it at every level.
///
/// `span` is the extended span (coarsest-level aligned) actually computed;
/// `requested` is what the caller asked for. Level `i` covers
/// `span.len() >> shift_i` frames starting at `file_spans[i].start()`.
#[derive(Debug, Clone)]
pub struct DecimatedStake {
    span: Span,
    requested: Span,
    file_set: Arc<FileSet>,
    file_spans: Vec<Span>,
    table: Arc<LevelTable>,
}

impl DecimatedStake {
    pub(crate) fn new(
        span: Span,
        requested: Span,
        file_set: Arc<FileSet>,
        file_spans: Vec<Span>,
        table: Arc<LevelTable>,
    ) -> Self {
        debug_assert_eq!(file_spans.len(), table.num_levels());
        debug_assert!(table.is_extended(&span));
        Self {
            span,
            requested,
            file_set,
            file_spans,
            table,
        }
    }

    /// Extended span on the full-resolution timeline.
    pub fn span(&self) -> Span {
        self.span
    }

    /// The span originally requested.
    pub fn requested(&self) -> Span {
        self.requested
    }

    pub fn file_set(&self) -> &Arc<FileSet> {
        &self.file_set
    }

    pub fn file(&self, level: usize) -> &Arc<CacheFile> {
        self.file_set.file(level)
    }

    pub fn file_span(&self, level: usize) -> Span {
        self.file_spans[level]
    }

    pub fn file_spans(&self) -> &[Span] {
        &self.file_spans
    }

    pub fn table(&self) -> &Arc<LevelTable> {
        &self.table
    }

    /// Trim the stake to `span`, widened to coarsest-level boundaries.
    ///
    /// Every level's file range moves by the same proportion. Returns `None`
    /// when nothing of the stake remains.
    pub fn sub_stake(&self, span: Span) -> Option<DecimatedStake> {
        let sub = self.table.extend(span).intersection(&self.span)?;

        let file_spans = self
            .table
            .levels()
            .iter()
            .zip(&self.file_spans)
            .map(|(level, file_span)| {
                let offset = level.decimated_len(sub.start() - self.span.start());
                Span::with_len(file_span.start() + offset, level.decimated_len(sub.len()))
            })
            .collect();

        let requested = self.requested.intersection(&sub).unwrap_or(sub);

        Some(Self {
            span: sub,
            requested,
            file_set: Arc::clone(&self.file_set),
            file_spans,
            table: Arc::clone(&self.table),
        })
    }
}
