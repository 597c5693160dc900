//! # Strata Analysis
//!
//! Per-level decimation transforms for the strata cache.
//!
//! Every transform reduces one block of full-resolution samples (one channel)
//! to one decimated frame:
//! - **PCM**: subsampled passthrough
//! - **Half-wave peak/RMS**: max, min and per-polarity RMS
//! - **Median**: block median
//! - **Full-wave peak/RMS**: absolute peak and RMS
//! - **SONA**: band-limited magnitude spectrum
//!
//! All transforms operate on raw `&[f32]` blocks - no framework dependencies.
//!
//! ## Example
//!
//! ```rust
//! use strata_analysis::Model;
//!
//! let mut decimator = Model::FullwavePeakRms.decimator();
//! let mut frame = vec![0.0; decimator.model_channels()];
//! decimator.decimate(&[0.5; 1024], &mut frame);
//! assert_eq!(frame[0], 0.5);
//! ```

pub mod decimator;
pub mod model;
pub mod sona;

pub use decimator::{Decimator, DecimatorFactory, FullwavePeakRms, HalfwavePeakRms, Median, Pcm};
pub use model::Model;
pub use sona::{Sona, SONA_BANDS};
