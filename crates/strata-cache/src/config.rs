//! Decimated trail configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strata_analysis::Model;
use strata_core::LevelTable;

/// Configuration for level layout, block sizes and rebuild pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailConfig {
    /// Statistic stored per decimated frame (default: full-wave peak/RMS)
    pub model: Model,
    /// Strictly increasing log2 decimation factors (default: [2, 4, 6, 8, 10])
    pub shifts: Vec<u32>,
    /// Source frames processed per block (default: 8192, rounded up to the
    /// coarsest decimation factor)
    pub block_size: usize,
    /// Source frames allocated per background stake (default: 65536)
    pub rebuild_chunk: u64,
    /// Minimum frames between progress events (default: 44100)
    pub progress_interval: u64,
    /// Directory for cache files (default: platform temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            model: Model::FullwavePeakRms,
            shifts: vec![2, 4, 6, 8, 10],
            block_size: 8192,
            rebuild_chunk: 65536,
            progress_interval: 44100,
            temp_dir: None,
        }
    }
}

impl TrailConfig {
    /// Create config with a different model.
    pub fn with_model(model: Model) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Build the level table for a source running at `sample_rate`.
    pub fn level_table(&self, sample_rate: f64) -> strata_core::Result<LevelTable> {
        LevelTable::new(sample_rate, &self.shifts)
    }

    /// Block size in frames, aligned to the table's coarsest factor.
    pub fn block_frames(&self, table: &LevelTable) -> usize {
        table.round_up(self.block_size as u64) as usize
    }

    /// Background stake size in frames, aligned to the table's coarsest factor.
    pub fn rebuild_frames(&self, table: &LevelTable) -> u64 {
        table.round_up(self.rebuild_chunk)
    }
}
