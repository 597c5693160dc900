//! # Strata - Multi-resolution Decimation Cache
//!
//! Precomputes and persists a pyramid of increasingly coarse summaries of a
//! long multi-channel audio source, so a viewer can draw any zoom level
//! without rescanning full-resolution samples.
//!
//! ## Architecture
//!
//! Strata is an umbrella crate that coordinates:
//! - **strata-core** - Spans, decimation level tables, the upstream source trait
//! - **strata-analysis** - Per-level transforms (PCM, peak/RMS, median, spectral)
//! - **strata-cache** - Temp-file storage, stake allocation, sync/async engines,
//!   resolution selection
//!
//! ## Quick Start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let source = Arc::new(MemorySource::constant(44100.0, 2, 100_000, 0.5));
//! let trail = DecimatedTrail::builder(source)
//!     .model(Model::FullwavePeakRms)
//!     .build()?;
//!
//! // Fill the whole pyramid on a background thread
//! trail.rebuild_all()?;
//! trail.wait_rebuild();
//!
//! // Ask for at least 200 frames over the full span
//! let info = trail.get_best_subsample(Span::new(0, 100_000), 200)?;
//! let mut frames = vec![vec![0.0; info.sublength as usize]; trail.decim_channels()];
//! trail.read(&info, &mut frames)?;
//! # Ok::<(), strata::Error>(())
//! ```

/// Re-export of strata-core for direct access
pub use strata_core as core;

/// Re-export of strata-analysis for direct access
pub use strata_analysis as analysis;

/// Re-export of strata-cache for direct access
pub use strata_cache as cache;

mod error;
pub use error::{Error, Result};

// Core types
pub use strata_core::{
    AudioSource, DecimationLevel, DependantList, LevelTable, MemorySource, SourceDependant, Span,
    Subscription, SubscriptionId,
};

// Transforms
pub use strata_analysis::{Decimator, DecimatorFactory, Model, SONA_BANDS};

// Cache
pub use strata_cache::{
    AsyncEvent, AsyncListener, ChannelListener, DecimatedStake, DecimatedTrail, DecimationInfo,
    ListenerId, Outcome, RebuildStart, RebuildState, Segment, TrailBuilder, TrailConfig,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Error, Result};

    pub use crate::{AudioSource, LevelTable, MemorySource, SourceDependant, Span};

    pub use crate::{Decimator, DecimatorFactory, Model};

    pub use crate::{
        AsyncEvent, AsyncListener, ChannelListener, DecimatedTrail, DecimationInfo, Outcome,
        RebuildStart, RebuildState, TrailConfig,
    };

    pub use std::sync::Arc;
}
