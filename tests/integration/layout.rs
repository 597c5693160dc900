//! Level layout and allocation scenarios.

use crate::helpers::*;
use strata::prelude::*;

#[test]
fn test_100k_frame_scenario() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 100_000, 0.5));
    let trail = test_trail(source, &dir);
    let full = Span::new(0, 100_000);

    assert_eq!(trail.levels().max_shift(), 10);

    let stake = trail.allocate(full).unwrap();
    assert_eq!(stake.span(), Span::new(0, 100_352));
    assert_eq!(stake.file_span(4).len(), 98);

    let info = trail.get_best_subsample(full, 200).unwrap();
    assert!(info.level < 4, "98 coarsest frames cannot satisfy 200");
    assert_eq!(info.level, 3);
    assert!(info.sublength >= 200);
}

#[test]
fn test_allocation_lengths_match_extended_span() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 2, 10, 0.0));
    let trail = test_trail(source, &dir);
    let table = Arc::clone(trail.levels());

    for span in [
        Span::new(0, 1),
        Span::new(1023, 1025),
        Span::new(5000, 70_001),
        Span::new(2048, 2048),
    ] {
        let stake = trail.allocate(span).unwrap();
        let extended = table.extend(span);
        assert_eq!(stake.span(), extended);
        for level in table.levels() {
            assert_eq!(
                stake.file_span(level.index).len(),
                extended.len() >> level.shift,
                "level {} of {}",
                level.index,
                span
            );
        }
    }
}

#[test]
fn test_sequential_allocations_never_overlap() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 10, 0.0));
    let trail = test_trail(source, &dir);

    let stakes: Vec<_> = (0..8u64)
        .map(|i| trail.allocate(Span::with_len(i * 3000, 5000)).unwrap())
        .collect();

    for level in 0..trail.num_decimations() {
        for pair in stakes.windows(2) {
            assert!(pair[0].file_span(level).stop() <= pair[1].file_span(level).start());
        }
    }
}

#[test]
fn test_level_rates() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(48000.0, 1, 10, 0.0));
    let trail = test_trail(source, &dir);

    let rates: Vec<f64> = trail.levels().levels().iter().map(|l| l.rate).collect();
    assert_eq!(rates, vec![12000.0, 3000.0, 750.0, 187.5, 46.875]);
}

#[test]
fn test_gaps_before_any_commit() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 50_000, 0.5));
    let trail = test_trail(source, &dir);

    trail.update(Span::new(10_240, 20_480)).unwrap();

    let info = trail.get_best_subsample(Span::new(0, 30_720), 30).unwrap();
    assert_eq!(
        info.gaps(),
        vec![Span::new(0, 10_240), Span::new(20_480, 30_720)]
    );

    let mut out = vec![vec![1.0; info.sublength as usize]; trail.decim_channels()];
    let covered = trail.read(&info, &mut out).unwrap();
    assert_eq!(covered, 10_240 >> info.shift);

    // Gaps read as zeros, the committed middle as the constant
    assert_eq!(out[0][0], 0.0);
    assert_eq!(out[0][info.offset_of(10_240) as usize], 0.5);
    assert_eq!(*out[0].last().unwrap(), 0.0);
}

mod properties {
    use crate::helpers::*;
    use proptest::prelude::*;
    use strata::prelude::*;
    use strata::DecimatedStake;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_allocations_are_extended_and_disjoint(
            spans in prop::collection::vec((0u64..500_000, 0u64..100_000), 1..6)
        ) {
            let dir = test_dir();
            let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 10, 0.0));
            let trail = test_trail(source, &dir);
            let table = Arc::clone(trail.levels());

            let mut previous: Option<DecimatedStake> = None;
            for (start, len) in spans {
                let span = Span::with_len(start, len);
                let stake = trail.allocate(span).unwrap();
                let extended = table.extend(span);
                prop_assert_eq!(stake.span(), extended);
                prop_assert!(stake.span().contains_span(&span));

                for level in table.levels() {
                    let file_span = stake.file_span(level.index);
                    prop_assert_eq!(file_span.len(), extended.len() >> level.shift);
                    if let Some(prev) = &previous {
                        prop_assert!(prev.file_span(level.index).stop() <= file_span.start());
                    }
                }
                previous = Some(stake);
            }
        }
    }
}
