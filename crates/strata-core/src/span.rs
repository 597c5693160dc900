//! Half-open frame ranges on the full-resolution timeline.

use crate::error::{Error, Result};
use std::fmt;

/// A half-open `[start, stop)` range of sample frames.
///
/// `start <= stop` always holds; an empty span has `start == stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    start: u64,
    stop: u64,
}

impl Span {
    /// Create a span.
    ///
    /// # Panics
    /// Panics if `start > stop`. Use [`Span::try_new`] for untrusted input.
    pub fn new(start: u64, stop: u64) -> Self {
        assert!(start <= stop, "BUG: span start {start} after stop {stop}");
        Self { start, stop }
    }

    /// Create a span, rejecting `start > stop`.
    pub fn try_new(start: u64, stop: u64) -> Result<Self> {
        if start > stop {
            return Err(Error::InvalidSpan { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// Span of `len` frames beginning at `start`, saturating at `u64::MAX`.
    pub fn with_len(start: u64, len: u64) -> Self {
        Self::new(start, start.saturating_add(len))
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn stop(&self) -> u64 {
        self.stop
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.stop - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start && frame < self.stop
    }

    /// Whether `other` lies entirely within this span.
    pub fn contains_span(&self, other: &Span) -> bool {
        other.start >= self.start && other.stop <= self.stop
    }

    /// True if the two spans share at least one frame.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.stop && other.start < self.stop
    }

    pub fn intersection(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let stop = self.stop.min(other.stop);
        (start < stop).then_some(Span { start, stop })
    }

    /// Smallest span covering both.
    pub fn union(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    /// Clamp the span to `[0, len)`.
    pub fn clamp_to(&self, len: u64) -> Span {
        let stop = self.stop.min(len);
        let start = self.start.min(stop);
        Span { start, stop }
    }

    /// Floor `start` and ceil `stop` to multiples of `factor` (a power of two).
    ///
    /// A `stop` past the last representable multiple is clamped to it.
    pub fn align_out(&self, factor: u64) -> Span {
        debug_assert!(factor.is_power_of_two());
        let mask = !(factor - 1);
        Span {
            start: self.start & mask,
            stop: self.stop.saturating_add(factor - 1) & mask,
        }
    }

    /// Whether both bounds are multiples of `factor` (a power of two).
    pub fn is_aligned(&self, factor: u64) -> bool {
        debug_assert!(factor.is_power_of_two());
        let low = factor - 1;
        self.start & low == 0 && self.stop & low == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}
