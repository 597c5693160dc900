//! Resolution selection.

use crate::index::{Segment, StakeIndex};
use strata_core::{LevelTable, Span};

/// Pick the coarsest level that still yields at least `min_len` decimated
/// frames over `span`. Falls back to the finest level.
pub fn select_level(table: &LevelTable, span: Span, min_len: u64) -> usize {
    table
        .levels()
        .iter()
        .rev()
        .find(|level| level.decimated_len(span.len()) >= min_len)
        .map_or(0, |level| level.index)
}

/// Where to read a span at the selected resolution.
#[derive(Debug, Clone)]
pub struct DecimationInfo {
    pub level: usize,
    pub shift: u32,
    /// Frame rate at `level`.
    pub rate: f64,
    /// The requested span widened to multiples of the level factor.
    pub span: Span,
    /// Decimated frames covering `span`.
    pub sublength: u64,
    /// Committed regions of `span`, in timeline order.
    pub segments: Vec<Segment>,
}

impl DecimationInfo {
    pub(crate) fn select(table: &LevelTable, index: &StakeIndex, span: Span, min_len: u64) -> Self {
        let level = table.level(select_level(table, span, min_len));
        let aligned = span.align_out(level.factor());
        Self {
            level: level.index,
            shift: level.shift,
            rate: level.rate,
            span: aligned,
            sublength: level.decimated_len(aligned.len()),
            segments: index.segments(level.index, aligned),
        }
    }

    /// Parts of `span` not yet computed.
    pub fn gaps(&self) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut cursor = self.span.start();
        for segment in &self.segments {
            if segment.span.start() > cursor {
                gaps.push(Span::new(cursor, segment.span.start()));
            }
            cursor = cursor.max(segment.span.stop());
        }
        if cursor < self.span.stop() {
            gaps.push(Span::new(cursor, self.span.stop()));
        }
        gaps
    }

    /// Whether every frame of `span` is committed.
    pub fn is_complete(&self) -> bool {
        self.gaps().is_empty()
    }

    /// Offset of `frame` (full-resolution) within the decimated output.
    pub fn offset_of(&self, frame: u64) -> u64 {
        (frame.saturating_sub(self.span.start())) >> self.shift
    }
}
