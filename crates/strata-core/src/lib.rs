//! # Strata Core
//!
//! Shared vocabulary for the strata decimation cache:
//! - [`Span`]: half-open frame ranges on the full-resolution timeline
//! - [`LevelTable`]: the power-of-two decimation pyramid and its alignment masks
//! - [`AudioSource`]: the upstream full-resolution reader, with dependant
//!   registration for change notifications
//!
//! ## Example
//!
//! ```rust
//! use strata_core::{LevelTable, Span};
//!
//! let table = LevelTable::new(44100.0, &[2, 4, 6, 8, 10]).unwrap();
//! let extended = table.extend(Span::new(0, 100_000));
//! assert_eq!(table.coarsest().decimated_len(extended.len()), 98);
//! ```

pub mod error;
pub mod level;
pub mod source;
pub mod span;

pub use error::{Error, Result};
pub use level::{DecimationLevel, LevelTable, MAX_SUPPORTED_SHIFT};
pub use source::{
    AudioSource, DependantList, MemorySource, SourceDependant, Subscription, SubscriptionId,
};
pub use span::Span;
