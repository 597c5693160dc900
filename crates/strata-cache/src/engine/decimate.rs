//! Synchronous decimation engine.

use crate::error::Result;
use crate::scratch::ScratchBuffers;
use crate::stake::DecimatedStake;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_analysis::{Decimator, DecimatorFactory};
use strata_core::{AudioSource, LevelTable, Span};

/// How a decimation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// The cancel flag was raised; the stake is partially written and must
    /// not be committed.
    Cancelled,
}

/// Fills reserved stakes with decimated frames on the calling thread.
pub struct DecimationEngine {
    table: Arc<LevelTable>,
    factory: DecimatorFactory,
    model_channels: usize,
    block_frames: usize,
}

impl DecimationEngine {
    /// `block_frames` must be a multiple of the coarsest decimation factor.
    pub fn new(
        table: Arc<LevelTable>,
        factory: DecimatorFactory,
        model_channels: usize,
        block_frames: usize,
    ) -> Self {
        assert!(
            block_frames > 0 && block_frames as u64 % table.max_coarse() == 0,
            "BUG: block of {block_frames} frames is not aligned to {}",
            table.max_coarse()
        );
        Self {
            table,
            factory,
            model_channels,
            block_frames,
        }
    }

    pub fn table(&self) -> &Arc<LevelTable> {
        &self.table
    }

    pub fn model_channels(&self) -> usize {
        self.model_channels
    }

    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Compute every level of `stake` from `source`.
    ///
    /// The extended span is read in blocks; frames past the end of the source
    /// decimate as silence. `cancel` is polled before each block.
    ///
    /// # Panics
    /// Panics if the frames written to any level differ from the reserved
    /// length, or if `scratch` is too small for this engine's block size.
    pub fn decimate(
        &self,
        source: &dyn AudioSource,
        stake: &DecimatedStake,
        scratch: &mut ScratchBuffers,
        cancel: Option<&AtomicBool>,
    ) -> Result<Outcome> {
        let full_channels = source.num_channels();
        let model_channels = self.model_channels;
        assert!(
            scratch.full.len() >= full_channels
                && scratch.full.iter().all(|c| c.len() >= self.block_frames),
            "BUG: scratch buffers smaller than {full_channels}x{} frames",
            self.block_frames
        );
        assert!(
            scratch.decimated.len() >= full_channels * model_channels,
            "BUG: decimated scratch has {} channels, need {}",
            scratch.decimated.len(),
            full_channels * model_channels
        );

        let mut decimators: Vec<Vec<Box<dyn Decimator>>> = self
            .table
            .levels()
            .iter()
            .map(|_| (0..full_channels).map(|_| (self.factory)()).collect())
            .collect();

        let span = stake.span();
        let source_len = source.num_frames();
        let mut written = vec![0u64; self.table.num_levels()];
        let mut frame = vec![0.0f32; model_channels];
        let mut pos = span.start();

        while pos < span.stop() {
            if cancel.is_some_and(|c| c.load(Ordering::Acquire)) {
                tracing::debug!("Decimation of {} cancelled at frame {}", span, pos);
                return Ok(Outcome::Cancelled);
            }

            let block_len = (span.stop() - pos).min(self.block_frames as u64) as usize;
            let block = Span::with_len(pos, block_len as u64);
            let available = block.clamp_to(source_len);

            if !available.is_empty() {
                source.read_frames(available, &mut scratch.full)?;
            }
            let valid = available.len() as usize;
            for channel in scratch.full.iter_mut().take(full_channels) {
                channel[valid..block_len].fill(0.0);
            }

            for (index, level) in self.table.levels().iter().enumerate() {
                let factor = level.factor() as usize;
                let frames = block_len >> level.shift;

                for (channel, decimator) in decimators[index].iter_mut().enumerate() {
                    let input = &scratch.full[channel][..block_len];
                    let first_out = channel * model_channels;
                    for (n, chunk) in input.chunks_exact(factor).take(frames).enumerate() {
                        decimator.decimate(chunk, &mut frame);
                        for (m, value) in frame.iter().enumerate() {
                            scratch.decimated[first_out + m][n] = *value;
                        }
                    }
                }

                let file_span = stake.file_span(index);
                stake.file(index).write_frames(
                    file_span.start() + written[index],
                    &scratch.decimated,
                    frames,
                )?;
                written[index] += frames as u64;
            }

            pos += block_len as u64;
        }

        for (index, &count) in written.iter().enumerate() {
            let reserved = stake.file_span(index).len();
            assert_eq!(
                count, reserved,
                "BUG: level {index} wrote {count} frames into a {reserved}-frame range"
            );
        }

        Ok(Outcome::Completed)
    }
}
