//! Per-level transforms.
//!
//! A [`Decimator`] maps one block of full-resolution samples from a single
//! channel to one decimated frame of `model_channels()` values. The cache
//! calls it identically from the interactive and background paths, so it
//! must be a pure function of the block; any internal state is scratch
//! space only.

use std::sync::Arc;

/// Block-to-frame transform for one decimation model.
pub trait Decimator: Send {
    /// Number of values written per frame.
    fn model_channels(&self) -> usize;

    /// Summarize `block` into `frame[..model_channels()]`.
    ///
    /// `block` is never empty; its length is the level's decimation factor.
    fn decimate(&mut self, block: &[f32], frame: &mut [f32]);
}

/// Produces a fresh transform per decimation run.
pub type DecimatorFactory = Arc<dyn Fn() -> Box<dyn Decimator> + Send + Sync>;

/// Subsampling passthrough: keeps the first sample of each block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pcm;

impl Decimator for Pcm {
    fn model_channels(&self) -> usize {
        1
    }

    fn decimate(&mut self, block: &[f32], frame: &mut [f32]) {
        frame[0] = block.first().copied().unwrap_or(0.0);
    }
}

/// Absolute peak and RMS: `[peak, rms]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullwavePeakRms;

impl Decimator for FullwavePeakRms {
    fn model_channels(&self) -> usize {
        2
    }

    fn decimate(&mut self, block: &[f32], frame: &mut [f32]) {
        if block.is_empty() {
            frame[..2].fill(0.0);
            return;
        }

        let mut peak = 0.0f32;
        let mut sum_sq = 0.0f32;
        for &sample in block {
            peak = peak.max(sample.abs());
            sum_sq += sample * sample;
        }

        frame[0] = peak;
        frame[1] = (sum_sq / block.len() as f32).sqrt();
    }
}

/// Half-wave envelopes: `[max, min, positive rms, -negative rms]`.
///
/// The half-wave RMS values are taken over the whole block with the other
/// polarity counted as silence, so a constant positive block yields
/// `[v, v, v, 0]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfwavePeakRms;

impl Decimator for HalfwavePeakRms {
    fn model_channels(&self) -> usize {
        4
    }

    fn decimate(&mut self, block: &[f32], frame: &mut [f32]) {
        if block.is_empty() {
            frame[..4].fill(0.0);
            return;
        }

        let mut max = f32::MIN;
        let mut min = f32::MAX;
        let mut pos_sq = 0.0f32;
        let mut neg_sq = 0.0f32;

        for &sample in block {
            max = max.max(sample);
            min = min.min(sample);
            if sample >= 0.0 {
                pos_sq += sample * sample;
            } else {
                neg_sq += sample * sample;
            }
        }

        let n = block.len() as f32;
        frame[0] = max;
        frame[1] = min;
        frame[2] = (pos_sq / n).sqrt();
        frame[3] = -(neg_sq / n).sqrt();
    }
}

/// Block median; even-length blocks average the two middle values.
#[derive(Debug, Clone, Default)]
pub struct Median {
    sorted: Vec<f32>,
}

impl Decimator for Median {
    fn model_channels(&self) -> usize {
        1
    }

    fn decimate(&mut self, block: &[f32], frame: &mut [f32]) {
        if block.is_empty() {
            frame[0] = 0.0;
            return;
        }

        self.sorted.clear();
        self.sorted.extend_from_slice(block);
        self.sorted.sort_unstable_by(|a, b| a.total_cmp(b));

        let mid = self.sorted.len() / 2;
        frame[0] = if self.sorted.len() % 2 == 0 {
            (self.sorted[mid - 1] + self.sorted[mid]) * 0.5
        } else {
            self.sorted[mid]
        };
    }
}
