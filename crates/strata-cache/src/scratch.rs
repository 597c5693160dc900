//! Reusable block buffers for the decimation engines.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Working buffers for one decimation pass.
#[derive(Debug)]
pub struct ScratchBuffers {
    /// `[full_channels][block_frames]` source frames.
    pub full: Vec<Vec<f32>>,
    /// `[decim_channels][block_frames >> finest_shift]` decimated frames.
    pub decimated: Vec<Vec<f32>>,
}

impl ScratchBuffers {
    pub fn new(
        full_channels: usize,
        decim_channels: usize,
        block_frames: usize,
        finest_shift: u32,
    ) -> Self {
        Self {
            full: vec![vec![0.0; block_frames]; full_channels],
            decimated: vec![vec![0.0; block_frames >> finest_shift]; decim_channels],
        }
    }
}

/// Lock-guarded pool of [`ScratchBuffers`].
///
/// Buffers are taken out under the lock and returned when the lease drops,
/// so no lock is held while decimating. An empty pool allocates a fresh set,
/// which lets several synchronous updates run at once.
pub struct ScratchPool {
    full_channels: usize,
    decim_channels: usize,
    block_frames: usize,
    finest_shift: u32,
    free: Mutex<Vec<ScratchBuffers>>,
    retired: AtomicBool,
}

impl ScratchPool {
    pub fn new(
        full_channels: usize,
        decim_channels: usize,
        block_frames: usize,
        finest_shift: u32,
    ) -> Self {
        Self {
            full_channels,
            decim_channels,
            block_frames,
            finest_shift,
            free: Mutex::new(Vec::new()),
            retired: AtomicBool::new(false),
        }
    }

    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    pub fn lease(&self) -> ScratchLease<'_> {
        let buffers = self.free.lock().pop().unwrap_or_else(|| {
            ScratchBuffers::new(
                self.full_channels,
                self.decim_channels,
                self.block_frames,
                self.finest_shift,
            )
        });
        ScratchLease {
            pool: self,
            buffers: Some(buffers),
        }
    }

    /// Buffer sets currently parked in the pool.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Drop every pooled buffer. Leases returned afterwards are discarded.
    pub fn free(&self) {
        self.retired.store(true, Ordering::Release);
        self.free.lock().clear();
    }

    fn give_back(&self, buffers: ScratchBuffers) {
        if !self.retired.load(Ordering::Acquire) {
            self.free.lock().push(buffers);
        }
    }
}

/// Buffers on loan from a [`ScratchPool`].
pub struct ScratchLease<'a> {
    pool: &'a ScratchPool,
    buffers: Option<ScratchBuffers>,
}

impl Deref for ScratchLease<'_> {
    type Target = ScratchBuffers;

    fn deref(&self) -> &ScratchBuffers {
        self.buffers
            .as_ref()
            .expect("BUG: scratch lease used after return")
    }
}

impl DerefMut for ScratchLease<'_> {
    fn deref_mut(&mut self) -> &mut ScratchBuffers {
        self.buffers
            .as_mut()
            .expect("BUG: scratch lease used after return")
    }
}

impl Drop for ScratchLease<'_> {
    fn drop(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            self.pool.give_back(buffers);
        }
    }
}
