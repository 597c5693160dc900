//! Decimate-then-read round trips through every model.

use crate::helpers::tolerances::*;
use crate::helpers::*;
use approx::assert_relative_eq;
use strata::prelude::*;
use strata::SONA_BANDS;

const VALUE: f32 = 0.375;
const FRAMES: usize = 50_000;

fn constant_trail(model: Model, dir: &tempfile::TempDir) -> DecimatedTrail {
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 2, FRAMES, VALUE));
    DecimatedTrail::builder(source)
        .model(model)
        .block_size(4096)
        .temp_dir(dir.path())
        .build()
        .unwrap()
}

/// Coarsest-level frames entirely inside the source.
fn coarsest_frames(trail: &DecimatedTrail) -> (Vec<Vec<f32>>, usize) {
    let span = Span::new(0, FRAMES as u64);
    let (info, out) = read_best(trail, span, 1);
    assert_eq!(info.level, trail.num_decimations() - 1);
    let full = FRAMES >> info.shift;
    (out, full)
}

#[test]
fn test_constant_fullwave_peak_rms() {
    let dir = test_dir();
    let trail = constant_trail(Model::FullwavePeakRms, &dir);
    trail.update(Span::new(0, FRAMES as u64)).unwrap();

    let (out, full) = coarsest_frames(&trail);
    for channel in 0..trail.channel_count() {
        for frame in 0..full {
            assert_relative_eq!(out[channel * 2][frame], VALUE, epsilon = FLOAT_EPSILON);
            assert_relative_eq!(out[channel * 2 + 1][frame], VALUE, epsilon = RMS_EPSILON);
        }
    }
}

#[test]
fn test_constant_pcm() {
    let dir = test_dir();
    let trail = constant_trail(Model::Pcm, &dir);
    trail.update(Span::new(0, FRAMES as u64)).unwrap();

    let (out, full) = coarsest_frames(&trail);
    assert_eq!(trail.decim_channels(), 2);
    assert!(out[0][..full].iter().all(|&v| v == VALUE));
    assert!(out[1][..full].iter().all(|&v| v == VALUE));
}

#[test]
fn test_constant_median() {
    let dir = test_dir();
    let trail = constant_trail(Model::Median, &dir);
    trail.update(Span::new(0, FRAMES as u64)).unwrap();

    let (out, full) = coarsest_frames(&trail);
    assert!(out[0][..full].iter().all(|&v| v == VALUE));
}

#[test]
fn test_constant_halfwave() {
    let dir = test_dir();
    let trail = constant_trail(Model::HalfwavePeakRms, &dir);
    trail.update(Span::new(0, FRAMES as u64)).unwrap();

    let (out, full) = coarsest_frames(&trail);
    assert_eq!(trail.num_model_channels(), 4);
    for frame in 0..full {
        assert_eq!(out[0][frame], VALUE);
        assert_eq!(out[1][frame], VALUE);
        assert_relative_eq!(out[2][frame], VALUE, epsilon = RMS_EPSILON);
        assert_eq!(out[3][frame], 0.0);
    }
}

#[test]
fn test_constant_sona() {
    let dir = test_dir();
    let trail = constant_trail(Model::Sona, &dir);
    trail.update(Span::new(0, FRAMES as u64)).unwrap();

    let (out, full) = coarsest_frames(&trail);
    assert_eq!(trail.num_model_channels(), SONA_BANDS);
    for frame in 0..full {
        assert_relative_eq!(out[0][frame], VALUE, epsilon = SPECTRAL_EPSILON);
        for band in 1..SONA_BANDS {
            assert!(out[band][frame].abs() < SPECTRAL_EPSILON);
        }
    }
}

#[test]
fn test_every_level_agrees_on_sine_peak() {
    let dir = test_dir();
    let sine = generate_sine(441.0, TEST_SAMPLE_RATE, 44_100);
    let source = Arc::new(MemorySource::new(TEST_SAMPLE_RATE, vec![sine]).unwrap());
    let trail = test_trail(source, &dir);
    trail.update(Span::new(0, 44_100)).unwrap();

    // The first frame of each selected level spans the first crest
    for min_len in [40u64, 170, 680] {
        let (info, out) = read_best(&trail, Span::new(0, 44_032), min_len);
        assert!(info.shift >= 6);
        assert_relative_eq!(out[0][0], 1.0, epsilon = 1e-3);
        assert!(out[1][0] > 0.6 && out[1][0] < 0.75);
    }
}

#[test]
fn test_custom_decimator_factory() {
    struct Sum;
    impl Decimator for Sum {
        fn model_channels(&self) -> usize {
            1
        }
        fn decimate(&mut self, block: &[f32], frame: &mut [f32]) {
            frame[0] = block.iter().sum();
        }
    }

    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 4096, 1.0));
    let factory: DecimatorFactory = Arc::new(|| Box::new(Sum) as Box<dyn Decimator>);
    let trail = DecimatedTrail::builder(source)
        .decimator_factory(factory)
        .temp_dir(dir.path())
        .build()
        .unwrap();
    assert_eq!(trail.num_model_channels(), 1);

    trail.update(Span::new(0, 4096)).unwrap();
    let (info, out) = read_best(&trail, Span::new(0, 4096), 4);
    assert_eq!(info.level, 4);
    assert_eq!(out[0], vec![1024.0; 4]);
}

#[test]
fn test_ramp_update_overrides_region_only() {
    let dir = test_dir();
    let source = Arc::new(MemorySource::constant(TEST_SAMPLE_RATE, 1, 8192, 0.0));
    let trail = DecimatedTrail::builder(Arc::clone(&source) as Arc<dyn AudioSource>)
        .model(Model::Pcm)
        .temp_dir(dir.path())
        .build()
        .unwrap();
    trail.update(Span::new(0, 8192)).unwrap();

    source
        .replace(2048, &[generate_ramp(1024)])
        .unwrap();
    trail.update(Span::new(2048, 3072)).unwrap();

    let (info, out) = read_best(&trail, Span::new(0, 8192), 2048);
    assert_eq!(info.shift, 2);
    assert_eq!(out[0][511], 0.0);
    assert_eq!(out[0][512], 0.0);
    assert_eq!(out[0][513], 4.0);
    assert_eq!(out[0][767], 1020.0);
    assert_eq!(out[0][768], 0.0);
    assert_eq!(trail.committed().len(), 3);
}
