//! Background rebuild: completion, progress, cancellation, busy rejection.

use crate::helpers::*;
use approx::assert_relative_eq;
use std::time::Duration;
use strata::prelude::*;

const FRAMES: usize = 200_000;

fn slow_source(value: f32, delay_ms: u64) -> Arc<SlowSource> {
    Arc::new(SlowSource::new(
        MemorySource::constant(TEST_SAMPLE_RATE, 1, FRAMES, value),
        Duration::from_millis(delay_ms),
    ))
}

fn updates(events: &[AsyncEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            AsyncEvent::Update { frames_done, .. } => Some(*frames_done),
            AsyncEvent::Finished => None,
        })
        .collect()
}

fn finished_count(events: &[AsyncEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, AsyncEvent::Finished))
        .count()
}

#[test]
fn test_rebuild_runs_to_finish() {
    init_tracing();
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 2, 100_000, 0.5));
    let trail = test_trail(source, &dir);
    let (listener, rx) = ChannelListener::new();
    trail.add_async_listener(listener);
    assert_eq!(drain(&rx), vec![AsyncEvent::Finished]);

    assert_eq!(trail.rebuild_all().unwrap(), RebuildStart::Started);
    trail.wait_rebuild();

    assert_eq!(trail.rebuild_state(), RebuildState::Finished);
    assert!(!trail.is_busy());
    assert!(trail.last_rebuild_error().is_none());

    let events = drain(&rx);
    let progress = updates(&events);
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.last(), Some(&100_000));
    assert_eq!(events.last(), Some(&AsyncEvent::Finished));
    assert_eq!(finished_count(&events), 1);

    let committed = trail.committed();
    assert_eq!(committed.extent(), Some(Span::new(0, 100_352)));
    assert!(committed
        .stakes()
        .iter()
        .all(|s| s.file_set().kind() == strata::cache::FileSetKind::Async));

    let (info, out) = read_best(&trail, Span::new(0, 99_328), 1);
    assert_eq!(info.level, 4);
    assert!(info.is_complete());
    for frame in 0..info.sublength as usize {
        assert_eq!(out[0][frame], 0.5);
        assert_relative_eq!(out[3][frame], 0.5, epsilon = 1e-4);
    }
}

#[test]
fn test_second_start_while_running_is_busy() {
    let dir = test_dir();
    let source = slow_source(0.5, 5);
    let trail = test_trail(source.clone(), &dir);

    assert_eq!(trail.rebuild_all().unwrap(), RebuildStart::Started);
    assert!(trail.is_busy());
    assert_eq!(trail.rebuild_all().unwrap(), RebuildStart::Busy);
    assert_eq!(
        trail.start_rebuild(Span::new(0, 1000)).unwrap(),
        RebuildStart::Busy
    );

    trail.cancel_rebuild();
    assert!(!trail.is_busy());
}

#[test]
fn test_cancel_midway_keeps_previous_cache() {
    let dir = test_dir();
    let source = slow_source(0.25, 2);
    let trail = test_trail(source.clone(), &dir);

    trail.update(Span::new(0, FRAMES as u64)).unwrap();
    let before = trail.committed();
    let files_before = files_in(&dir);

    let (listener, rx) = ChannelListener::new();
    trail.add_async_listener(listener);
    let _ = drain(&rx);

    let reads_before = source.reads();
    trail.rebuild_all().unwrap();
    assert!(wait_for(Duration::from_secs(5), || source.reads()
        >= reads_before + 3));

    trail.cancel_rebuild();

    assert!(!trail.is_busy());
    assert_eq!(trail.rebuild_state(), RebuildState::Idle);
    assert_eq!(finished_count(&drain(&rx)), 0);
    assert!(Arc::ptr_eq(&before, &trail.committed()));
    // The partial async file set is gone
    assert_eq!(files_in(&dir), files_before);

    let (_, out) = read_best(&trail, Span::new(0, 196_608), 1);
    assert!(out[0].iter().all(|&p| p == 0.25));
}

#[test]
fn test_cancel_with_timeout() {
    let dir = test_dir();
    let source = slow_source(0.5, 5);
    let trail = test_trail(source.clone(), &dir);

    trail.rebuild_all().unwrap();
    assert!(wait_for(Duration::from_secs(5), || source.reads() >= 1));

    assert!(trail.cancel_rebuild_timeout(Duration::from_secs(10)));
    assert_eq!(trail.rebuild_state(), RebuildState::Idle);
    assert!(trail.committed().is_empty());
}

#[test]
fn test_source_change_cancels_rebuild() {
    let dir = test_dir();
    let source = slow_source(0.5, 2);
    let trail = test_trail(source.clone(), &dir);
    let (listener, rx) = ChannelListener::new();
    trail.add_async_listener(listener);
    let _ = drain(&rx);

    trail.rebuild_all().unwrap();
    assert!(wait_for(Duration::from_secs(5), || source.reads() >= 2));

    source
        .inner()
        .replace(0, &[vec![-1.0; 4096]])
        .unwrap();
    trail.wait_rebuild();

    assert_eq!(trail.rebuild_state(), RebuildState::Idle);
    assert_eq!(finished_count(&drain(&rx)), 0);
    assert!(trail.committed().is_empty());

    // The caller restarts it and sees the edit
    assert_eq!(trail.rebuild_all().unwrap(), RebuildStart::Started);
    trail.wait_rebuild();
    assert_eq!(trail.rebuild_state(), RebuildState::Finished);
    assert_eq!(finished_count(&drain(&rx)), 1);

    let (info, out) = read_best(&trail, Span::new(0, 8192), 8);
    assert_eq!(info.level, 4);
    assert_eq!(out[0][..4], [1.0, 1.0, 1.0, 1.0]);
    assert_eq!(out[0][4..], [0.5, 0.5, 0.5, 0.5]);
}

#[test]
fn test_source_change_while_idle_does_nothing() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 4096, 0.0));
    let trail = test_trail(source.clone(), &dir);

    source.replace(0, &[vec![1.0; 16]]).unwrap();
    assert_eq!(trail.rebuild_state(), RebuildState::Idle);
    assert_eq!(trail.rebuild_all().unwrap(), RebuildStart::Started);
    trail.wait_rebuild();
    assert_eq!(trail.rebuild_state(), RebuildState::Finished);
}

#[test]
fn test_listener_registered_while_idle_gets_finished() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 4096, 0.0));
    let trail = test_trail(source, &dir);

    let (listener, rx) = ChannelListener::new();
    let id = trail.add_async_listener(listener);
    assert_eq!(drain(&rx), vec![AsyncEvent::Finished]);

    // Still registered: the next rebuild reaches it
    trail.rebuild_all().unwrap();
    trail.wait_rebuild();
    assert_eq!(finished_count(&drain(&rx)), 1);

    assert!(trail.remove_async_listener(id));
    trail.rebuild_all().unwrap();
    trail.wait_rebuild();
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_rebuild_error_keeps_previous_cache() {
    init_tracing();
    let dir = test_dir();
    let source = slow_source(0.5, 0);
    let trail = test_trail(source.clone(), &dir);
    trail.update(Span::new(0, 65_536)).unwrap();
    let before = trail.committed();
    let files_before = files_in(&dir);

    let (listener, rx) = ChannelListener::new();
    trail.add_async_listener(listener);
    let _ = drain(&rx);

    source.fail_reads(true);
    trail.rebuild_all().unwrap();
    trail.wait_rebuild();

    assert_eq!(trail.rebuild_state(), RebuildState::Idle);
    let error = trail.last_rebuild_error().expect("rebuild should fail");
    assert!(error.contains("failed"), "{error}");
    assert_eq!(finished_count(&drain(&rx)), 0);
    assert!(Arc::ptr_eq(&before, &trail.committed()));
    assert_eq!(files_in(&dir), files_before);

    // The trail stays usable
    source.fail_reads(false);
    trail.rebuild_all().unwrap();
    trail.wait_rebuild();
    assert!(trail.last_rebuild_error().is_none());
    assert_eq!(trail.rebuild_state(), RebuildState::Finished);
}

#[test]
fn test_update_after_rebuild_overrides_region_only() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 65_536, 0.5));
    let trail = test_trail(source.clone(), &dir);
    trail.rebuild_all().unwrap();
    trail.wait_rebuild();

    source.replace(16_384, &[vec![0.75; 8192]]).unwrap();
    trail.update(Span::new(16_384, 24_576)).unwrap();

    let committed = trail.committed();
    assert_eq!(committed.gaps(Span::new(0, 65_536)), vec![]);
    let kinds: Vec<_> = committed
        .stakes()
        .iter()
        .map(|s| (s.span(), s.file_set().kind()))
        .collect();
    assert!(kinds.contains(&(Span::new(16_384, 24_576), strata::cache::FileSetKind::Sync)));

    let (info, out) = read_best(&trail, Span::new(0, 65_536), 64);
    assert_eq!(info.level, 4);
    assert_eq!(out[0][15], 0.5);
    assert!(out[0][16..24].iter().all(|&p| p == 0.75));
    assert_eq!(out[0][24], 0.5);
}

#[test]
fn test_partial_rebuild_span() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 65_536, 0.5));
    let trail = test_trail(source, &dir);
    let (listener, rx) = ChannelListener::new();
    trail.add_async_listener(listener);
    let _ = drain(&rx);

    trail.start_rebuild(Span::new(10_000, 30_000)).unwrap();
    trail.wait_rebuild();

    assert_eq!(updates(&drain(&rx)).last(), Some(&20_000));
    assert_eq!(trail.committed().extent(), Some(Span::new(9216, 30_720)));
}
