//! Decimation engines.
//!
//! - [`DecimationEngine`]: fills a reserved stake on the calling thread
//! - [`Rebuilder`]: runs a whole-span rebuild on a background worker, with
//!   cooperative cancellation and progress listeners

mod decimate;
mod events;
mod rebuild;

pub use decimate::{DecimationEngine, Outcome};
pub use events::{AsyncEvent, AsyncListener, ChannelListener, ListenerId};
pub use rebuild::{RebuildCanceller, RebuildContext, RebuildStart, RebuildState, Rebuilder};
