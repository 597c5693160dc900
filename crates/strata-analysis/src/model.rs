//! Decimation models.
//!
//! A model names the statistic stored per decimated frame. The numeric tags
//! are stable and may be persisted alongside cache metadata.

use crate::decimator::{
    Decimator, DecimatorFactory, FullwavePeakRms, HalfwavePeakRms, Median, Pcm,
};
use crate::sona::{Sona, SONA_BANDS};
use std::fmt;
use std::sync::Arc;

/// Statistic computed for each decimated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum Model {
    /// Raw PCM, subsampled (first frame of each block).
    Pcm,
    /// Positive peak, negative peak, positive-half RMS, negative-half RMS.
    HalfwavePeakRms,
    /// Block median.
    Median,
    /// Absolute peak and RMS.
    #[default]
    FullwavePeakRms,
    /// Band-limited magnitude spectrum.
    Sona,
}

impl Model {
    pub const ALL: [Model; 5] = [
        Model::Pcm,
        Model::HalfwavePeakRms,
        Model::Median,
        Model::FullwavePeakRms,
        Model::Sona,
    ];

    /// Stable numeric tag.
    pub fn tag(self) -> u32 {
        match self {
            Model::Pcm => 0,
            Model::HalfwavePeakRms => 1,
            Model::Median => 2,
            Model::FullwavePeakRms => 3,
            Model::Sona => 10,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.tag() == tag)
    }

    /// Decimated channels produced per source channel.
    pub fn model_channels(self) -> usize {
        match self {
            Model::Pcm | Model::Median => 1,
            Model::FullwavePeakRms => 2,
            Model::HalfwavePeakRms => 4,
            Model::Sona => SONA_BANDS,
        }
    }

    /// Fresh transform instance for this model.
    pub fn decimator(self) -> Box<dyn Decimator> {
        match self {
            Model::Pcm => Box::new(Pcm),
            Model::HalfwavePeakRms => Box::new(HalfwavePeakRms),
            Model::Median => Box::new(Median::default()),
            Model::FullwavePeakRms => Box::new(FullwavePeakRms),
            Model::Sona => Box::new(Sona::new()),
        }
    }

    /// Shareable factory producing this model's transform.
    pub fn factory(self) -> DecimatorFactory {
        Arc::new(move || self.decimator())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Model::Pcm => "pcm",
            Model::HalfwavePeakRms => "halfwave-peak-rms",
            Model::Median => "median",
            Model::FullwavePeakRms => "fullwave-peak-rms",
            Model::Sona => "sona",
        };
        f.write_str(name)
    }
}
