//! # Strata Cache
//!
//! Temp-file-backed multi-resolution decimation cache.
//!
//! ## Structure
//!
//! - [`storage`]: per-level cache files, grouped into sync and async file sets
//! - [`allocator`]: reserves per-level file ranges for a source span
//! - [`index`]: committed stakes, readable without locks
//! - [`engine`]: synchronous decimation and the background rebuild worker
//! - [`selector`]: picks the coarsest level still resolving a span
//! - [`DecimatedTrail`]: the facade tying them to one [`AudioSource`](strata_core::AudioSource)
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_cache::DecimatedTrail;
//! use strata_core::{MemorySource, Span};
//!
//! let source = Arc::new(MemorySource::constant(44100.0, 1, 100_000, 0.5));
//! let trail = DecimatedTrail::builder(source).build().unwrap();
//!
//! trail.update(Span::new(0, 100_000)).unwrap();
//!
//! let info = trail.get_best_subsample(Span::new(0, 100_000), 200).unwrap();
//! let mut out = vec![vec![0.0; info.sublength as usize]; trail.decim_channels()];
//! trail.read(&info, &mut out).unwrap();
//! assert_eq!(out[0][0], 0.5);
//! ```

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod scratch;
pub mod selector;
pub mod stake;
pub mod storage;
pub mod trail;

pub use config::TrailConfig;
pub use engine::{
    AsyncEvent, AsyncListener, ChannelListener, DecimationEngine, ListenerId, Outcome,
    RebuildStart, RebuildState,
};
pub use error::{Error, Result};
pub use index::{Segment, StakeIndex};
pub use selector::{select_level, DecimationInfo};
pub use stake::DecimatedStake;
pub use storage::{CacheFile, FileSet, FileSetKind};
pub use trail::{DecimatedTrail, TrailBuilder};
