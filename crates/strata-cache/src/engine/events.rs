//! Rebuild progress notifications.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of a background rebuild.
///
/// Callbacks run on the rebuild worker thread and should return quickly.
pub trait AsyncListener: Send + Sync {
    /// `frames_done` never decreases within one rebuild.
    fn on_progress(&self, frames_done: u64, total: u64);

    /// The rebuild completed and its result is readable.
    fn on_finished(&self);
}

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

impl ListenerId {
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Rebuild event as delivered through a [`ChannelListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncEvent {
    Update { frames_done: u64, total: u64 },
    Finished,
}

/// Forwards events into a channel for polling from a UI thread.
pub struct ChannelListener {
    tx: Sender<AsyncEvent>,
}

impl ChannelListener {
    pub fn new() -> (Arc<Self>, Receiver<AsyncEvent>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl AsyncListener for ChannelListener {
    fn on_progress(&self, frames_done: u64, total: u64) {
        let _ = self.tx.send(AsyncEvent::Update { frames_done, total });
    }

    fn on_finished(&self) {
        let _ = self.tx.send(AsyncEvent::Finished);
    }
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn AsyncListener>)>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Arc<dyn AsyncListener>) -> ListenerId {
        let id = ListenerId::generate();
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(entry, _)| *entry != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Copy of the current listeners, so callbacks run without the lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn AsyncListener>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    pub(crate) fn progress(&self, frames_done: u64, total: u64) {
        for listener in self.snapshot() {
            listener.on_progress(frames_done, total);
        }
    }
}
