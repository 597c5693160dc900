//! Decimation level table.
//!
//! Describes the resolution pyramid: each level reduces the full-resolution
//! timeline by a power-of-two factor. Levels are ordered finest to coarsest
//! and never change once the table is built.

use crate::error::{Error, Result};
use crate::span::Span;

/// Largest supported shift (decimation factor of 2^30).
pub const MAX_SUPPORTED_SHIFT: u32 = 30;

/// One entry of the resolution pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimationLevel {
    /// Position in the table (0 = finest).
    pub index: usize,
    /// log2 of the decimation factor.
    pub shift: u32,
    /// Frames per second at this level.
    pub rate: f64,
}

impl DecimationLevel {
    /// Number of full-resolution frames summarized by one decimated frame.
    #[inline]
    pub fn factor(&self) -> u64 {
        1u64 << self.shift
    }

    /// Decimated length of a span of `len` full-resolution frames.
    #[inline]
    pub fn decimated_len(&self, len: u64) -> u64 {
        len >> self.shift
    }
}

/// The full set of decimation levels plus the masks derived from the
/// coarsest one.
#[derive(Debug, Clone)]
pub struct LevelTable {
    levels: Vec<DecimationLevel>,
    source_rate: f64,
    max_shift: u32,
    max_coarse: u64,
    max_mask: u64,
    max_ceil_add: u64,
}

impl LevelTable {
    /// Build a table from the source sample rate and strictly increasing shifts.
    pub fn new(source_rate: f64, shifts: &[u32]) -> Result<Self> {
        if !(source_rate > 0.0 && source_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "source sample rate must be positive, got {source_rate}"
            )));
        }
        if shifts.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one decimation level is required".into(),
            ));
        }
        if shifts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidConfig(format!(
                "decimation shifts must be strictly increasing: {shifts:?}"
            )));
        }

        let max_shift = shifts[shifts.len() - 1];
        if max_shift > MAX_SUPPORTED_SHIFT {
            return Err(Error::InvalidConfig(format!(
                "decimation shift {max_shift} exceeds {MAX_SUPPORTED_SHIFT}"
            )));
        }

        let levels = shifts
            .iter()
            .enumerate()
            .map(|(index, &shift)| DecimationLevel {
                index,
                shift,
                rate: source_rate / (1u64 << shift) as f64,
            })
            .collect();

        let max_coarse = 1u64 << max_shift;

        Ok(Self {
            levels,
            source_rate,
            max_shift,
            max_coarse,
            max_mask: !(max_coarse - 1),
            max_ceil_add: max_coarse - 1,
        })
    }

    /// Number of levels (SUBNUM).
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// # Panics
    /// Panics if `index` is out of range.
    #[inline]
    pub fn level(&self, index: usize) -> &DecimationLevel {
        &self.levels[index]
    }

    pub fn levels(&self) -> &[DecimationLevel] {
        &self.levels
    }

    pub fn finest(&self) -> &DecimationLevel {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &DecimationLevel {
        &self.levels[self.levels.len() - 1]
    }

    pub fn source_rate(&self) -> f64 {
        self.source_rate
    }

    /// Shift of the coarsest level (MAXSHIFT).
    pub fn max_shift(&self) -> u32 {
        self.max_shift
    }

    /// Decimation factor of the coarsest level (MAXCOARSE).
    pub fn max_coarse(&self) -> u64 {
        self.max_coarse
    }

    /// Floor mask for coarsest-level boundaries (MAXMASK).
    pub fn max_mask(&self) -> u64 {
        self.max_mask
    }

    /// Expand `span` outward to coarsest-level boundaries so every level
    /// receives a whole number of decimated frames.
    ///
    /// Already-aligned spans are returned unchanged. A `stop` past the last
    /// representable boundary is clamped to that boundary.
    pub fn extend(&self, span: Span) -> Span {
        let floor_start = span.start() & self.max_mask;
        let ceil_stop = span.stop().saturating_add(self.max_ceil_add) & self.max_mask;
        if floor_start == span.start() && ceil_stop == span.stop() {
            span
        } else {
            Span::new(floor_start, ceil_stop)
        }
    }

    /// Whether `span` sits on coarsest-level boundaries.
    pub fn is_extended(&self, span: &Span) -> bool {
        span.is_aligned(self.max_coarse)
    }

    /// Round a frame count up to a multiple of MAXCOARSE (at least one).
    pub fn round_up(&self, frames: u64) -> u64 {
        (frames.max(1).saturating_add(self.max_ceil_add) & self.max_mask).max(self.max_coarse)
    }
}
