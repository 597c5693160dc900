//! Committed stake index.
//!
//! A stake only becomes readable once it has been fully written and
//! committed here. The index is a sorted list of disjoint stakes; committing
//! a stake trims or splits whatever older stakes it overlaps, so the newest
//! data for a region always wins.
//!
//! Readers load an immutable snapshot through `arc-swap` and never block
//! writers. Writers are serialized by a mutex and publish a new snapshot per
//! commit.

use crate::stake::DecimatedStake;
use crate::storage::CacheFile;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use strata_core::Span;

/// A committed region at one level.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Full-resolution span covered.
    pub span: Span,
    pub file: Arc<CacheFile>,
    /// Decimated frames in `file` holding `span`.
    pub file_span: Span,
}

/// Sorted, non-overlapping committed stakes.
#[derive(Debug, Clone, Default)]
pub struct StakeIndex {
    stakes: Vec<DecimatedStake>,
}

impl StakeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stakes(&self) -> &[DecimatedStake] {
        &self.stakes
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Insert `stake`, trimming older stakes out of its span.
    pub fn insert(&mut self, stake: DecimatedStake) {
        let span = stake.span();
        if span.is_empty() {
            return;
        }

        let mut kept = Vec::with_capacity(self.stakes.len() + 2);
        for old in self.stakes.drain(..) {
            if !old.span().overlaps(&span) {
                kept.push(old);
                continue;
            }
            let old_span = old.span();
            if old_span.start() < span.start() {
                kept.extend(old.sub_stake(Span::new(old_span.start(), span.start())));
            }
            if old_span.stop() > span.stop() {
                kept.extend(old.sub_stake(Span::new(span.stop(), old_span.stop())));
            }
        }

        let at = kept.partition_point(|s| s.span().start() < span.start());
        kept.insert(at, stake);
        self.stakes = kept;
    }

    /// Smallest span covering every committed stake.
    pub fn extent(&self) -> Option<Span> {
        let first = self.stakes.first()?;
        let last = self.stakes.last()?;
        Some(first.span().union(&last.span()))
    }

    /// Committed regions of `span` at `level`, in timeline order.
    pub fn segments(&self, level: usize, span: Span) -> Vec<Segment> {
        self.stakes
            .iter()
            .filter_map(|stake| {
                let covered = stake.span().intersection(&span)?;
                let shift = stake.table().level(level).shift;
                let factor = 1u64 << shift;
                let base = stake.file_span(level).start();
                let first = (covered.start() - stake.span().start()) >> shift;
                let last = (covered.stop() - stake.span().start() + factor - 1) >> shift;
                Some(Segment {
                    span: covered,
                    file: Arc::clone(stake.file(level)),
                    file_span: Span::new(base + first, base + last),
                })
            })
            .collect()
    }

    /// Parts of `span` with no committed data.
    pub fn gaps(&self, span: Span) -> Vec<Span> {
        let mut gaps = Vec::new();
        let mut cursor = span.start();
        for stake in &self.stakes {
            let Some(covered) = stake.span().intersection(&span) else {
                continue;
            };
            if covered.start() > cursor {
                gaps.push(Span::new(cursor, covered.start()));
            }
            cursor = cursor.max(covered.stop());
        }
        if cursor < span.stop() {
            gaps.push(Span::new(cursor, span.stop()));
        }
        gaps
    }
}

/// The authoritative index shared by readers and both write paths.
pub struct CommittedIndex {
    current: ArcSwap<StakeIndex>,
    writer: Mutex<()>,
}

impl Default for CommittedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CommittedIndex {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(StakeIndex::new()),
            writer: Mutex::new(()),
        }
    }

    /// Current snapshot. Never blocks.
    pub fn load(&self) -> Arc<StakeIndex> {
        self.current.load_full()
    }

    pub fn commit(&self, stake: DecimatedStake) {
        self.merge(std::iter::once(stake));
    }

    /// Commit several stakes as one publication.
    pub fn merge(&self, stakes: impl IntoIterator<Item = DecimatedStake>) {
        let _writer = self.writer.lock();
        let mut next = StakeIndex::clone(&self.current.load());
        for stake in stakes {
            next.insert(stake);
        }
        self.current.store(Arc::new(next));
    }

    /// Empty the index, returning what it held.
    pub fn clear(&self) -> Arc<StakeIndex> {
        let _writer = self.writer.lock();
        self.current.swap(Arc::new(StakeIndex::new()))
    }
}
