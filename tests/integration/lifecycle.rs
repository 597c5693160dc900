//! Disposal, temp-file cleanup and concurrent synchronous updates.

use crate::helpers::*;
use std::time::Duration;
use strata::cache::Error as CacheError;
use strata::prelude::*;

#[test]
fn test_dispose_is_idempotent_and_removes_files() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 2, 50_000, 0.5));
    let trail = test_trail(source.clone(), &dir);

    trail.update(Span::new(0, 10_000)).unwrap();
    trail.rebuild_all().unwrap();
    trail.wait_rebuild();
    assert_eq!(files_in(&dir), 10);

    trail.dispose();
    trail.dispose();

    assert!(trail.is_disposed());
    assert_eq!(files_in(&dir), 0);
    assert!(source.dependants().is_empty());
    assert!(matches!(
        trail.update(Span::new(0, 100)),
        Err(CacheError::Disposed)
    ));
    assert!(matches!(
        trail.get_best_subsample(Span::new(0, 100), 1),
        Err(CacheError::Disposed)
    ));
}

#[test]
fn test_drop_removes_files() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 20_000, 0.5));
    {
        let trail = test_trail(source.clone(), &dir);
        trail.update(Span::new(0, 20_000)).unwrap();
        assert_eq!(files_in(&dir), 5);
        assert_eq!(source.dependants().len(), 1);
    }
    assert_eq!(files_in(&dir), 0);
    assert!(source.dependants().is_empty());
}

#[test]
fn test_dispose_stops_running_rebuild() {
    let dir = test_dir();
    let source = Arc::new(SlowSource::new(
        MemorySource::constant(TEST_SAMPLE_RATE, 1, 200_000, 0.5),
        Duration::from_millis(5),
    ));
    let trail = test_trail(source.clone(), &dir);
    let (listener, rx) = ChannelListener::new();
    trail.add_async_listener(listener);
    let _ = drain(&rx);

    trail.rebuild_all().unwrap();
    assert!(wait_for(Duration::from_secs(5), || source.reads() >= 1));

    trail.dispose();

    assert!(!trail.is_busy());
    assert_eq!(files_in(&dir), 0);
    assert!(!drain(&rx).contains(&AsyncEvent::Finished));
}

#[test]
fn test_outstanding_info_after_dispose_reports_closed_files() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 4096, 0.5));
    let trail = test_trail(source, &dir);
    trail.update(Span::new(0, 4096)).unwrap();

    let info = trail.get_best_subsample(Span::new(0, 4096), 4).unwrap();
    let file = info.segments[0].file.clone();
    trail.dispose();

    assert!(file.is_closed());
    let mut out = vec![vec![0.0; 4]; 2];
    assert!(matches!(
        file.read_frames(0, &mut out, 0, 4),
        Err(CacheError::FileClosed(_))
    ));
}

#[test]
fn test_concurrent_updates() {
    let dir = test_dir();
    let ramp = generate_ramp(131_072);
    let source = Arc::new(MemorySource::new(TEST_SAMPLE_RATE, vec![ramp]).unwrap());
    let trail = DecimatedTrail::builder(source)
        .model(Model::Pcm)
        .block_size(2048)
        .temp_dir(dir.path())
        .build()
        .unwrap();

    std::thread::scope(|s| {
        for worker in 0..4u64 {
            let trail = &trail;
            s.spawn(move || {
                for i in 0..8u64 {
                    let start = (worker * 8 + i) * 4096;
                    trail.update(Span::with_len(start, 4096)).unwrap();
                }
            });
        }
    });

    let committed = trail.committed();
    assert_eq!(committed.len(), 32);
    assert!(committed.gaps(Span::new(0, 131_072)).is_empty());

    let (info, out) = read_best(&trail, Span::new(0, 131_072), 128);
    assert_eq!(info.level, 4);
    for (frame, &value) in out[0].iter().enumerate() {
        assert_eq!(value, (frame * 1024) as f32);
    }
}

#[test]
fn test_update_during_rebuild() {
    let dir = test_dir();
    let source = Arc::new(SlowSource::new(
        MemorySource::constant(TEST_SAMPLE_RATE, 1, 100_000, 0.5),
        Duration::from_millis(1),
    ));
    let trail = test_trail(source.clone(), &dir);

    trail.rebuild_all().unwrap();
    // The sync path has its own file set and never waits for the worker
    trail.update(Span::new(0, 8192)).unwrap();
    assert!(trail.committed().len() >= 1);

    trail.wait_rebuild();
    assert_eq!(trail.rebuild_state(), RebuildState::Finished);
    let (_, out) = read_best(&trail, Span::new(0, 98_304), 1);
    assert!(out[0].iter().all(|&p| p == 0.5));
}

#[test]
fn test_config_round_trip_builds_same_trail() {
    let dir = test_dir();
    let config = TrailConfig {
        model: Model::HalfwavePeakRms,
        shifts: vec![3, 6, 9],
        temp_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };

    let source = Arc::new(MemorySource::constant(48000.0, 1, 1000, 0.0));
    let trail = DecimatedTrail::new(source, config.clone()).unwrap();
    assert_eq!(trail.config(), &config);
    assert_eq!(trail.num_decimations(), 3);
    assert_eq!(trail.num_model_channels(), 4);
    assert_eq!(trail.levels().max_coarse(), 512);
}
