//! Spectral ("SONA") model.
//!
//! Each decimated frame holds [`SONA_BANDS`] linearly spaced band levels of
//! the block's magnitude spectrum. Bins are scaled to amplitude (DC by `1/n`,
//! the rest single-sided by `2/n`) and each band keeps its loudest bin, so a
//! constant block of value `v` yields `|v|` in band 0 and silence elsewhere.

use crate::decimator::Decimator;
use rustfft::{num_complex::Complex, FftPlanner};

/// Bands (decimated channels) per source channel.
pub const SONA_BANDS: usize = 8;

pub struct Sona {
    planner: FftPlanner<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Sona {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer: Vec::new(),
        }
    }
}

impl Default for Sona {
    fn default() -> Self {
        Self::new()
    }
}

impl Decimator for Sona {
    fn model_channels(&self) -> usize {
        SONA_BANDS
    }

    fn decimate(&mut self, block: &[f32], frame: &mut [f32]) {
        let bands = &mut frame[..SONA_BANDS];
        bands.fill(0.0);

        let n = block.len();
        if n == 0 {
            return;
        }

        self.buffer.clear();
        self.buffer
            .extend(block.iter().map(|&s| Complex::new(s, 0.0)));

        // Planner caches plans per size
        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut self.buffer);

        let bins = n / 2 + 1;
        let scale = 1.0 / n as f32;
        for (k, c) in self.buffer[..bins].iter().enumerate() {
            let single_sided = k != 0 && !(n % 2 == 0 && k == n / 2);
            let magnitude = c.norm() * scale * if single_sided { 2.0 } else { 1.0 };
            let band = (k * SONA_BANDS / bins).min(SONA_BANDS - 1);
            if magnitude > bands[band] {
                bands[band] = magnitude;
            }
        }
    }
}
