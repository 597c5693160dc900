//! Upstream full-resolution sources.
//!
//! A decimation cache never owns its source. It reads frames through
//! [`AudioSource`] and registers itself as a [`SourceDependant`] so it hears
//! about edits. Registration is scoped by a [`Subscription`] guard which
//! unregisters on drop.

use crate::error::{Error, Result};
use crate::span::Span;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Receives change notifications from an [`AudioSource`].
///
/// Called on whichever thread mutated the source. Implementations must not
/// block.
pub trait SourceDependant: Send + Sync {
    /// Frames in `span` were modified (or appended).
    fn source_changed(&self, span: Span);
}

/// Unique identifier for a dependant registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Random-access, multi-channel, full-resolution sample source.
pub trait AudioSource: Send + Sync {
    fn num_channels(&self) -> usize;

    fn sample_rate(&self) -> f64;

    /// Total length in frames.
    fn num_frames(&self) -> u64;

    /// Which file channels feed which model channels. One map per
    /// underlying file; the default is a single identity map.
    fn channel_maps(&self) -> Vec<Vec<usize>> {
        vec![(0..self.num_channels()).collect()]
    }

    /// Copy `span.len()` frames into `buf[channel][0..span.len()]`.
    ///
    /// `span` must lie within `[0, num_frames())` and `buf` must hold at
    /// least `num_channels()` buffers of sufficient length.
    fn read_frames(&self, span: Span, buf: &mut [Vec<f32>]) -> Result<()>;

    fn subscribe(&self, dependant: Weak<dyn SourceDependant>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Registration guard; unsubscribes from the source when dropped.
pub struct Subscription {
    source: Arc<dyn AudioSource>,
    id: SubscriptionId,
}

impl Subscription {
    pub fn new(source: Arc<dyn AudioSource>, dependant: Weak<dyn SourceDependant>) -> Self {
        let id = source.subscribe(dependant);
        Self { source, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
        tracing::debug!("Unsubscribed dependant {:?}", self.id);
    }
}

/// Dependant bookkeeping for [`AudioSource`] implementors.
///
/// Holds weak references only, so a dependant that forgot to unsubscribe is
/// dropped silently on the next notification.
#[derive(Default)]
pub struct DependantList {
    entries: Mutex<Vec<(SubscriptionId, Weak<dyn SourceDependant>)>>,
}

impl DependantList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, dependant: Weak<dyn SourceDependant>) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.entries.lock().push((id, dependant));
        id
    }

    pub fn remove(&self, id: SubscriptionId) {
        self.entries.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Notify every live dependant. The list lock is released before calling
    /// out, so dependants may unsubscribe from inside the callback.
    pub fn notify(&self, span: Span) {
        let live: Vec<Arc<dyn SourceDependant>> = {
            let mut entries = self.entries.lock();
            entries.retain(|(_, weak)| weak.strong_count() > 0);
            entries.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        for dependant in live {
            dependant.source_changed(span);
        }
    }
}

/// In-memory [`AudioSource`] holding one `Vec<f32>` per channel.
pub struct MemorySource {
    sample_rate: f64,
    channels: RwLock<Vec<Vec<f32>>>,
    dependants: DependantList,
}

impl MemorySource {
    /// All channels must have the same length.
    pub fn new(sample_rate: f64, channels: Vec<Vec<f32>>) -> Result<Self> {
        if channels.is_empty() {
            return Err(Error::InvalidConfig("source needs at least one channel".into()));
        }
        let len = channels[0].len();
        if channels.iter().any(|c| c.len() != len) {
            return Err(Error::InvalidConfig(
                "all source channels must have the same length".into(),
            ));
        }
        Ok(Self {
            sample_rate,
            channels: RwLock::new(channels),
            dependants: DependantList::new(),
        })
    }

    /// Source where every sample equals `value`.
    pub fn constant(sample_rate: f64, num_channels: usize, num_frames: usize, value: f32) -> Self {
        Self {
            sample_rate,
            channels: RwLock::new(vec![vec![value; num_frames]; num_channels.max(1)]),
            dependants: DependantList::new(),
        }
    }

    /// Overwrite frames starting at `start`, growing the source if the data
    /// runs past the end. Dependants are notified with the touched span.
    pub fn replace(&self, start: u64, data: &[Vec<f32>]) -> Result<()> {
        let span = {
            let mut channels = self.channels.write();
            if data.len() != channels.len() {
                return Err(Error::ChannelMismatch {
                    expected: channels.len(),
                    actual: data.len(),
                });
            }
            let frames = data[0].len();
            if data.iter().any(|d| d.len() != frames) {
                return Err(Error::InvalidConfig(
                    "replacement channels must have the same length".into(),
                ));
            }

            let start_idx = start as usize;
            let stop_idx = start_idx + frames;
            for (dst, src) in channels.iter_mut().zip(data) {
                if dst.len() < stop_idx {
                    dst.resize(stop_idx, 0.0);
                }
                dst[start_idx..stop_idx].copy_from_slice(src);
            }
            Span::with_len(start, frames as u64)
        };

        self.dependants.notify(span);
        Ok(())
    }

    pub fn dependants(&self) -> &DependantList {
        &self.dependants
    }
}

impl AudioSource for MemorySource {
    fn num_channels(&self) -> usize {
        self.channels.read().len()
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn num_frames(&self) -> u64 {
        self.channels.read().first().map_or(0, |c| c.len() as u64)
    }

    fn read_frames(&self, span: Span, buf: &mut [Vec<f32>]) -> Result<()> {
        let channels = self.channels.read();
        let len = channels.first().map_or(0, |c| c.len() as u64);
        if span.stop() > len {
            return Err(Error::OutOfRange {
                start: span.start(),
                stop: span.stop(),
                len,
            });
        }
        if buf.len() < channels.len() {
            return Err(Error::ChannelMismatch {
                expected: channels.len(),
                actual: buf.len(),
            });
        }

        let start = span.start() as usize;
        let frames = span.len() as usize;
        for (dst, src) in buf.iter_mut().zip(channels.iter()) {
            dst[..frames].copy_from_slice(&src[start..start + frames]);
        }
        Ok(())
    }

    fn subscribe(&self, dependant: Weak<dyn SourceDependant>) -> SubscriptionId {
        self.dependants.add(dependant)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.dependants.remove(id);
    }
}
