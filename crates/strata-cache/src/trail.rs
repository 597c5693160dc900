//! The decimated trail: one source, its decimation cache and both engines.

use crate::allocator;
use crate::config::TrailConfig;
use crate::engine::{
    AsyncListener, DecimationEngine, ListenerId, Outcome, RebuildCanceller, RebuildContext,
    RebuildStart, RebuildState, Rebuilder,
};
use crate::error::{Error, Result};
use crate::index::{CommittedIndex, StakeIndex};
use crate::scratch::ScratchPool;
use crate::selector::DecimationInfo;
use crate::stake::DecimatedStake;
use crate::storage::{CacheStorage, FileSetKind};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_analysis::{DecimatorFactory, Model};
use strata_core::{AudioSource, LevelTable, SourceDependant, Span, Subscription};

/// Cancels a running rebuild when the source is edited underneath it.
struct SourceWatch {
    canceller: RebuildCanceller,
}

impl SourceDependant for SourceWatch {
    fn source_changed(&self, span: Span) {
        if self.canceller.request_cancel() {
            tracing::info!("Source changed in {}, cancelling background rebuild", span);
        }
    }
}

/// Everything the rebuild worker shares with the caller.
struct TrailInner {
    source: Arc<dyn AudioSource>,
    config: TrailConfig,
    table: Arc<LevelTable>,
    full_channels: usize,
    model_channels: usize,
    storage: CacheStorage,
    index: CommittedIndex,
    scratch: ScratchPool,
    engine: DecimationEngine,
}

impl TrailInner {
    fn decim_channels(&self) -> usize {
        self.full_channels * self.model_channels
    }

    fn rebuild(&self, span: Span, ctx: &mut RebuildContext) -> Result<()> {
        match self.rebuild_into(span, ctx) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.discard_async();
                tracing::info!("Background rebuild of {} cancelled", span);
                Ok(())
            }
            Err(e) => {
                self.discard_async();
                Err(e)
            }
        }
    }

    /// Returns whether the result was committed.
    fn rebuild_into(&self, span: Span, ctx: &mut RebuildContext) -> Result<bool> {
        self.storage
            .replace(&mut self.storage.lock(FileSetKind::Async))?;

        let chunk = self.config.rebuild_frames(&self.table);
        let extended = self.table.extend(span);
        let mut scratch = self.scratch.lease();
        let mut stakes = Vec::new();
        let mut done = 0;
        let mut pos = extended.start();

        while pos < extended.stop() {
            let sub = Span::new(pos, (pos + chunk).min(extended.stop()));
            let requested = sub.intersection(&span).unwrap_or(sub);
            let stake = allocator::alloc_async(
                &self.storage,
                &mut self.storage.lock(FileSetKind::Async),
                requested,
            )?;

            let outcome = self.engine.decimate(
                self.source.as_ref(),
                &stake,
                &mut scratch,
                Some(ctx.cancel_flag()),
            )?;
            if outcome == Outcome::Cancelled {
                return Ok(false);
            }

            stakes.push(stake);
            done += requested.len();
            ctx.report_progress(done);
            pos = sub.stop();
        }
        ctx.report_progress(ctx.total());

        Ok(ctx.finish(|| self.index.merge(stakes)))
    }

    fn discard_async(&self) {
        self.storage.delete(&mut self.storage.lock(FileSetKind::Async));
    }
}

/// Builder for [`DecimatedTrail`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use strata_analysis::Model;
/// use strata_cache::DecimatedTrail;
/// use strata_core::MemorySource;
///
/// let source = Arc::new(MemorySource::constant(44100.0, 2, 10_000, 0.5));
/// let trail = DecimatedTrail::builder(source)
///     .model(Model::Median)
///     .shifts(vec![2, 5, 8])
///     .build()
///     .unwrap();
/// assert_eq!(trail.num_decimations(), 3);
/// ```
pub struct TrailBuilder {
    source: Arc<dyn AudioSource>,
    config: TrailConfig,
    factory: Option<DecimatorFactory>,
}

impl TrailBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: TrailConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: full-wave peak/RMS
    pub fn model(mut self, model: Model) -> Self {
        self.config.model = model;
        self
    }

    /// Default: [2, 4, 6, 8, 10]
    pub fn shifts(mut self, shifts: Vec<u32>) -> Self {
        self.config.shifts = shifts;
        self
    }

    /// Default: 8192
    pub fn block_size(mut self, frames: usize) -> Self {
        self.config.block_size = frames;
        self
    }

    /// Default: 65536
    pub fn rebuild_chunk(mut self, frames: u64) -> Self {
        self.config.rebuild_chunk = frames;
        self
    }

    /// Default: 44100
    pub fn progress_interval(mut self, frames: u64) -> Self {
        self.config.progress_interval = frames;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Use a custom per-level transform instead of the model's built-in one.
    pub fn decimator_factory(mut self, factory: DecimatorFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> Result<DecimatedTrail> {
        let source = self.source;
        let config = self.config;

        let full_channels = source.num_channels();
        if full_channels == 0 {
            return Err(strata_core::Error::InvalidConfig("source has no channels".into()).into());
        }

        let table = Arc::new(config.level_table(source.sample_rate())?);
        let factory = self.factory.unwrap_or_else(|| config.model.factory());
        let model_channels = factory().model_channels();
        if model_channels == 0 {
            return Err(strata_core::Error::InvalidConfig(
                "decimator produces no channels".into(),
            )
            .into());
        }
        let decim_channels = full_channels * model_channels;
        let block_frames = config.block_frames(&table);
        let dir = config.temp_dir.clone().unwrap_or_else(std::env::temp_dir);

        let inner = Arc::new(TrailInner {
            storage: CacheStorage::new(Arc::clone(&table), decim_channels, dir),
            index: CommittedIndex::new(),
            scratch: ScratchPool::new(
                full_channels,
                decim_channels,
                block_frames,
                table.finest().shift,
            ),
            engine: DecimationEngine::new(
                Arc::clone(&table),
                factory,
                model_channels,
                block_frames,
            ),
            source: Arc::clone(&source),
            config,
            table,
            full_channels,
            model_channels,
        });

        let rebuilder = Rebuilder::new(inner.config.progress_interval);
        let watch: Arc<dyn SourceDependant> = Arc::new(SourceWatch {
            canceller: rebuilder.canceller(),
        });
        let subscription = Subscription::new(source, Arc::downgrade(&watch));

        tracing::debug!(
            "Created decimated trail: {} levels, {} -> {} channels, model {}",
            inner.table.num_levels(),
            full_channels,
            decim_channels,
            inner.config.model
        );

        Ok(DecimatedTrail {
            inner,
            rebuilder,
            _watch: watch,
            subscription: Mutex::new(Some(subscription)),
            disposed: AtomicBool::new(false),
        })
    }
}

/// Multi-resolution decimation cache for one audio source.
///
/// Interactive edits go through [`update`](Self::update) on the calling
/// thread; whole-span rebuilds run on a background worker
/// ([`start_rebuild`](Self::start_rebuild)). Both write into their own file
/// set and only become readable once committed. Viewers ask
/// [`get_best_subsample`](Self::get_best_subsample) for the right level and
/// [`read`](Self::read) it back.
pub struct DecimatedTrail {
    inner: Arc<TrailInner>,
    rebuilder: Rebuilder,
    _watch: Arc<dyn SourceDependant>,
    subscription: Mutex<Option<Subscription>>,
    disposed: AtomicBool,
}

impl DecimatedTrail {
    pub fn builder(source: Arc<dyn AudioSource>) -> TrailBuilder {
        TrailBuilder {
            source,
            config: TrailConfig::default(),
            factory: None,
        }
    }

    pub fn new(source: Arc<dyn AudioSource>, config: TrailConfig) -> Result<Self> {
        Self::builder(source).config(config).build()
    }

    fn check_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    // ==================== Synchronous path ====================

    /// Recompute `span` on the calling thread and commit it.
    pub fn update(&self, span: Span) -> Result<()> {
        self.check_live()?;
        if span.is_empty() {
            return Ok(());
        }
        let stake = self.allocate(span)?;
        match self.decimate(&stake, None)? {
            Outcome::Completed => self.commit(stake),
            Outcome::Cancelled => Ok(()),
        }
    }

    /// Reserve sync-path file ranges for `span` without computing them.
    pub fn allocate(&self, span: Span) -> Result<DecimatedStake> {
        self.check_live()?;
        let inner = &self.inner;
        allocator::alloc(&inner.storage, &mut inner.storage.lock(FileSetKind::Sync), span)
    }

    /// Fill a reserved stake. The stake is not readable until committed.
    pub fn decimate(&self, stake: &DecimatedStake, cancel: Option<&AtomicBool>) -> Result<Outcome> {
        self.check_live()?;
        let inner = &self.inner;
        let mut scratch = inner.scratch.lease();
        inner
            .engine
            .decimate(inner.source.as_ref(), stake, &mut scratch, cancel)
    }

    /// Make a fully written stake readable, replacing older data in its span.
    pub fn commit(&self, stake: DecimatedStake) -> Result<()> {
        self.check_live()?;
        debug_assert!(Arc::ptr_eq(stake.table(), &self.inner.table));
        self.inner.index.commit(stake);
        Ok(())
    }

    // ==================== Background rebuild ====================

    /// Rebuild `span` on the background worker.
    pub fn start_rebuild(&self, span: Span) -> Result<RebuildStart> {
        self.check_live()?;
        let inner = Arc::clone(&self.inner);
        self.rebuilder
            .start(span.len(), move |ctx| inner.rebuild(span, ctx))
    }

    /// Rebuild the whole source.
    pub fn rebuild_all(&self) -> Result<RebuildStart> {
        self.start_rebuild(Span::new(0, self.inner.source.num_frames()))
    }

    /// Cancel the running rebuild and wait for the worker to exit. The
    /// previously committed cache is left as it was.
    pub fn cancel_rebuild(&self) {
        self.rebuilder.cancel();
    }

    /// Returns `true` if the worker stopped within `timeout`.
    pub fn cancel_rebuild_timeout(&self, timeout: Duration) -> bool {
        self.rebuilder.cancel_timeout(timeout)
    }

    pub fn is_busy(&self) -> bool {
        self.rebuilder.is_busy()
    }

    pub fn rebuild_state(&self) -> RebuildState {
        self.rebuilder.state()
    }

    /// Block until the running rebuild (if any) completes or is cancelled.
    pub fn wait_rebuild(&self) {
        self.rebuilder.wait();
    }

    pub fn last_rebuild_error(&self) -> Option<String> {
        self.rebuilder.last_error()
    }

    /// Listen for rebuild progress. Fires `on_finished` immediately when no
    /// rebuild is running.
    pub fn add_async_listener(&self, listener: Arc<dyn AsyncListener>) -> ListenerId {
        self.rebuilder.add_listener(listener)
    }

    pub fn remove_async_listener(&self, id: ListenerId) -> bool {
        self.rebuilder.remove_listener(id)
    }

    // ==================== Reading ====================

    /// Pick the coarsest level giving at least `min_len` frames over `span`.
    pub fn get_best_subsample(&self, span: Span, min_len: u64) -> Result<DecimationInfo> {
        self.check_live()?;
        Ok(DecimationInfo::select(
            &self.inner.table,
            &self.inner.index.load(),
            span,
            min_len,
        ))
    }

    /// Read the frames described by `info` into `out[decim_channel][frame]`.
    ///
    /// Gaps read as zeros. Returns the number of frames that came from
    /// committed data.
    pub fn read(&self, info: &DecimationInfo, out: &mut [Vec<f32>]) -> Result<u64> {
        self.check_live()?;
        let channels = self.inner.decim_channels();
        let frames = info.sublength as usize;
        if out.len() < channels || out.iter().take(channels).any(|c| c.len() < frames) {
            return Err(Error::BufferTooSmall { channels, frames });
        }
        for channel in out.iter_mut().take(channels) {
            channel[..frames].fill(0.0);
        }

        let mut covered = 0u64;
        for segment in &info.segments {
            let offset = info.offset_of(segment.span.start()) as usize;
            let len = (segment.file_span.len() as usize).min(frames.saturating_sub(offset));
            segment
                .file
                .read_frames(segment.file_span.start(), out, offset, len)?;
            covered += len as u64;
        }
        Ok(covered)
    }

    /// Snapshot of the committed stakes.
    pub fn committed(&self) -> Arc<StakeIndex> {
        self.inner.index.load()
    }

    // ==================== Lifecycle ====================

    /// Stop the worker, detach from the source and delete every cache file.
    /// Safe to call more than once.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.rebuilder.cancel();
        drop(self.subscription.lock().take());
        self.inner.scratch.free();
        self.inner.storage.delete_all();
        let committed = self.inner.index.clear();
        for stake in committed.stakes() {
            stake.file_set().delete();
        }

        tracing::debug!("Disposed decimated trail");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    // ==================== Layout ====================

    /// Number of decimation levels.
    pub fn num_decimations(&self) -> usize {
        self.inner.table.num_levels()
    }

    pub fn levels(&self) -> &Arc<LevelTable> {
        &self.inner.table
    }

    /// Source channel count.
    pub fn channel_count(&self) -> usize {
        self.inner.full_channels
    }

    /// Values stored per source channel per decimated frame.
    pub fn num_model_channels(&self) -> usize {
        self.inner.model_channels
    }

    /// Channels per decimated frame (`channel_count * num_model_channels`).
    pub fn decim_channels(&self) -> usize {
        self.inner.decim_channels()
    }

    pub fn model(&self) -> Model {
        self.inner.config.model
    }

    pub fn config(&self) -> &TrailConfig {
        &self.inner.config
    }

    pub fn source(&self) -> &Arc<dyn AudioSource> {
        &self.inner.source
    }

    /// Channel maps over the decimated channels, one per source map.
    pub fn cache_channel_maps(&self) -> Vec<Vec<usize>> {
        self.inner
            .source
            .channel_maps()
            .iter()
            .map(|map| (0..map.len() * self.inner.model_channels).collect())
            .collect()
    }
}

impl Drop for DecimatedTrail {
    fn drop(&mut self) {
        self.dispose();
    }
}
