//! The audio path must not touch the allocator once `prepare` has run.
//!
//! nih-plug's `assert_process_allocs` feature installs the `AllocDisabler`
//! global allocator in debug builds, which arms `assert_no_alloc` here.

use assert_no_alloc::assert_no_alloc;
use neonscope::meters::Meters;
use neonscope::params::*;
use neonscope::processor::NeonProcessor;
use std::sync::Arc;

fn busy_params(os: Oversampling) -> ParameterSet {
    let mut params = ParameterSet::with_defaults();
    params
        .set_choice(ID_MODE, Mode::Hybrid)
        .set_choice(ID_OVERSAMPLING, os)
        .set_choice(ID_SAT_MODE, SatMode::Foldback)
        .set_choice(ID_MONITOR_MODE, MonitorMode::Side)
        .set(ID_DRIVE, 2.2)
        .set(ID_MIX, 0.6)
        .set(ID_WIDTH, 1.4)
        .set(ID_OUTPUT_TRIM, -3.0)
        .set_flag(ID_BAND_LISTEN, false);
    params
}

#[test]
fn process_does_not_allocate_after_prepare() {
    let block = 256;
    let mut p = NeonProcessor::new(Arc::new(Meters::new()));
    p.prepare(48000.0, block, 2);

    let all: Vec<ParameterSet> = Oversampling::CHOICES.iter().map(|&os| busy_params(os)).collect();
    let mut left: Vec<f32> = (0..block).map(|i| (i as f32 * 0.07).sin() * 0.8).collect();
    let mut right: Vec<f32> = (0..block).map(|i| (i as f32 * 0.11).cos() * 0.8).collect();

    assert_no_alloc(|| {
        for params in &all {
            // enough blocks to fill the spectrum FIFO several times
            for _ in 0..40 {
                let mut buffer: [&mut [f32]; 2] = [&mut left, &mut right];
                p.process(&mut buffer, 2, block, params);
            }
        }
    });

    assert!(p.spectrum_frames_analyzed() > 0);
    assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
}

#[test]
fn smaller_blocks_do_not_allocate() {
    let mut p = NeonProcessor::new(Arc::new(Meters::new()));
    p.prepare(44100.0, 512, 1);
    let params = busy_params(Oversampling::X1_7);
    let mut mono = vec![0.25f32; 512];

    assert_no_alloc(|| {
        for n in [1usize, 17, 100, 512] {
            let mut buffer: [&mut [f32]; 1] = [&mut mono[..n]];
            p.process(&mut buffer, 1, n, &params);
        }
    });
}
