//! Block processor: owns every piece of persistent DSP state and runs the
//! fixed chain once per host block.
//!
//! ```text
//! snapshot -> ramps -> filter -> band capture -> distortion (oversampled)
//!   -> width -> auto-gain -> dry/wet -> trim -> band substitution
//!   -> monitor -> hard clip -> limiter -> metering -> spectrum
//! ```
//!
//! # Lifecycle
//! - **prepare**: sizes every buffer for the announced block size and channel
//!   count, derives per-sample coefficients, clears state.
//! - **process**: allocation free as long as the host stays within what it
//!   announced. Larger blocks or more channels take a cold path under
//!   `permit_alloc`.
//! - **reset**: clears state, keeps buffers.
//! - **release**: frees buffers; `prepare` must run again before audio.

use crate::dsp::mix::{apply_trim, blend, copy_dry, BlendOutcome};
use crate::dsp::monitor::{apply_monitor, hard_clip};
use crate::dsp::stereo::apply_width;
use crate::dsp::{
    AutoGain, BlockRamp, MeteringEngine, Oversampler, SafetyLimiter, SpectrumAnalyzer,
    StateVariableFilter,
};
use crate::meters::Meters;
use crate::ns_log;
use crate::params::{ParamSource, ParameterSnapshot};
use assert_no_alloc::permit_alloc;
use std::sync::Arc;

const DEFAULT_SAMPLE_RATE: f32 = 44_100.0;
const DEFAULT_BLOCK_SIZE: usize = 512;

/// Values the ramps settled on at the end of the previous block.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RampTargets {
    drive: f32,
    mix: f32,
    output_trim_db: f32,
    width: f32,
}

impl RampTargets {
    fn from_snapshot(s: &ParameterSnapshot) -> Self {
        Self {
            drive: s.drive,
            mix: s.mix,
            output_trim_db: s.output_trim_db,
            width: s.width,
        }
    }
}

/// Grow (never shrink) each channel buffer to `len` and add channels up to
/// `channels`. No-op when already large enough.
fn fit_buffers(buffers: &mut Vec<Vec<f32>>, channels: usize, len: usize) {
    if buffers.len() < channels {
        buffers.resize_with(channels, Vec::new);
    }
    for buf in buffers.iter_mut() {
        if buf.len() < len {
            buf.resize(len, 0.0);
        }
    }
}

pub struct NeonProcessor {
    meters: Arc<Meters>,

    sample_rate: f32,
    max_block: usize,

    dry: Vec<Vec<f32>>,
    band_listen: Vec<Vec<f32>>,

    filters: Vec<StateVariableFilter>,
    oversampler: Oversampler,
    auto_gain: AutoGain,
    limiter: SafetyLimiter,
    metering: MeteringEngine,
    spectrum: SpectrumAnalyzer,

    // None until the first block after prepare/reset
    ramps: Option<RampTargets>,
}

impl NeonProcessor {
    pub fn new(meters: Arc<Meters>) -> Self {
        let sr = DEFAULT_SAMPLE_RATE;
        Self {
            meters,
            sample_rate: sr,
            max_block: 0,
            dry: Vec::new(),
            band_listen: Vec::new(),
            filters: Vec::new(),
            oversampler: Oversampler::new(),
            auto_gain: AutoGain::new(sr),
            limiter: SafetyLimiter::new(sr),
            metering: MeteringEngine::new(sr),
            spectrum: SpectrumAnalyzer::new(),
            ramps: None,
        }
    }

    pub fn meters(&self) -> &Arc<Meters> {
        &self.meters
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block
    }

    /// Smoothed auto-gain factor (linear).
    pub fn auto_gain_factor(&self) -> f32 {
        self.auto_gain.gain()
    }

    pub fn spectrum_frames_analyzed(&self) -> u64 {
        self.spectrum.frames_analyzed()
    }

    pub fn prepare(&mut self, sample_rate: f32, max_block_size: usize, num_channels: usize) {
        let sample_rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            DEFAULT_SAMPLE_RATE
        };
        let max_block = if max_block_size > 0 {
            max_block_size
        } else {
            DEFAULT_BLOCK_SIZE
        };
        let channels = num_channels.max(1);

        self.sample_rate = sample_rate;
        self.max_block = max_block;

        fit_buffers(&mut self.dry, channels, max_block);
        fit_buffers(&mut self.band_listen, channels, max_block);

        self.filters
            .resize(channels, StateVariableFilter::new(sample_rate));
        for filter in self.filters.iter_mut() {
            filter.set_sample_rate(sample_rate);
        }

        self.oversampler.prepare(channels, max_block);
        self.auto_gain.set_sample_rate(sample_rate);
        self.limiter.set_sample_rate(sample_rate);
        self.metering.set_sample_rate(sample_rate);
        self.spectrum.prepare(sample_rate);

        self.reset();
        self.meters.clear();

        log::debug!(
            "Prepared: {} Hz, max block {}, {} channel(s)",
            sample_rate,
            max_block,
            channels
        );
    }

    pub fn reset(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset();
        }
        self.oversampler.reset();
        self.auto_gain.reset();
        self.limiter.reset();
        self.metering.reset();
        self.spectrum.reset();
        self.ramps = None;
    }

    pub fn release(&mut self) {
        self.reset();
        self.dry = Vec::new();
        self.band_listen = Vec::new();
        self.filters = Vec::new();
        self.oversampler.release();
        self.spectrum.release();
        self.max_block = 0;
        self.meters.clear();
        log::debug!("Released processing resources");
    }

    /// Cold path for hosts that exceed what `prepare` announced.
    fn ensure_capacity(&mut self, channels: usize, num_samples: usize) {
        if channels <= self.dry.len()
            && channels <= self.filters.len()
            && num_samples <= self.max_block
        {
            return;
        }
        ns_log!(
            "[PROCESSOR] growing buffers to {} ch x {} samples",
            channels,
            num_samples
        );
        let len = num_samples.max(self.max_block);
        let sr = self.sample_rate;
        permit_alloc(|| {
            fit_buffers(&mut self.dry, channels, len);
            fit_buffers(&mut self.band_listen, channels, len);
            if self.filters.len() < channels {
                self.filters.resize(channels, StateVariableFilter::new(sr));
            }
        });
        self.max_block = len;
    }

    /// Process one block in place.
    ///
    /// `buffer` holds one slice per output channel. Channels at and above
    /// `input_channels` are silenced. `num_samples` is clamped to the
    /// shortest channel slice.
    pub fn process<P: ParamSource + ?Sized>(
        &mut self,
        buffer: &mut [&mut [f32]],
        input_channels: usize,
        num_samples: usize,
        params: &P,
    ) {
        let output_channels = buffer.len();
        let n = buffer
            .iter()
            .map(|ch| ch.len())
            .min()
            .unwrap_or(0)
            .min(num_samples);
        if output_channels == 0 || n == 0 {
            return;
        }

        for channel in buffer.iter_mut().skip(input_channels) {
            channel[..n].fill(0.0);
        }

        let active = input_channels.min(output_channels).max(1);
        self.ensure_capacity(active, n);
        let channels = &mut buffer[..active];

        let snapshot = ParameterSnapshot::read(params);

        for (dry, channel) in self.dry.iter_mut().zip(channels.iter()) {
            dry[..n].copy_from_slice(&channel[..n]);
        }

        // Ramps: first block after prepare starts settled on the target.
        let targets = RampTargets::from_snapshot(&snapshot);
        let previous = self.ramps.unwrap_or(targets);
        self.ramps = Some(targets);
        let drive = BlockRamp::new(previous.drive, targets.drive, n);
        let mix = BlockRamp::new(previous.mix, targets.mix, n);
        let trim = BlockRamp::new(previous.output_trim_db, targets.output_trim_db, n);
        let width = BlockRamp::new(previous.width, targets.width, n);

        let mode = snapshot.mode;
        let processing = mode.processing_active();
        let distortion = processing && mode.distortion_active();
        let mut captured_band = false;

        if processing {
            if mode.filter_active() {
                for (filter, channel) in self.filters.iter_mut().zip(channels.iter_mut()) {
                    filter.update(snapshot.filter_type, snapshot.cutoff_hz, snapshot.resonance);
                    filter.process_block(&mut channel[..n]);
                }

                if snapshot.band_listen_enabled {
                    for (band, channel) in self.band_listen.iter_mut().zip(channels.iter()) {
                        band[..n].copy_from_slice(&channel[..n]);
                    }
                    captured_band = true;
                }
            }

            if distortion {
                let sat = snapshot.sat_mode;
                let factor = snapshot.oversampling.factor();
                self.oversampler
                    .process(snapshot.oversampling, channels, n, |block| {
                        sat.apply_block(block, |i| drive.value_for_oversampled_index(i, factor));
                    });
            }

            if let [left, right] = &mut *channels {
                apply_width(&mut left[..n], &mut right[..n], &width);
            }
        }

        let wet_target = if distortion { mix.target() } else { 0.0 };

        if snapshot.auto_gain_enabled && distortion && wet_target > 0.0 {
            self.auto_gain.process(&self.dry[..active], channels, n);
        } else {
            self.auto_gain.idle(n);
        }

        let replaced_with_dry = distortion
            && blend(&self.dry[..active], channels, n, &mix) == BlendOutcome::ReplacedWithDry;

        if processing && !replaced_with_dry {
            apply_trim(channels, n, &trim);
        } else if !replaced_with_dry {
            copy_dry(&self.dry[..active], channels, n);
        }

        if captured_band {
            copy_dry(&self.band_listen[..active], channels, n);
        }

        apply_monitor(snapshot.monitor_mode, channels, n);
        hard_clip(channels, n);

        if snapshot.limiter_enabled {
            self.limiter.process(channels, n);
        } else {
            self.limiter.bypass();
        }

        self.meters
            .set_limiter_reduction_db(self.limiter.reduction_db());
        self.meters.set_auto_gain_db(self.auto_gain.gain_db());

        let (left, right): (&[f32], Option<&[f32]>) = match &*channels {
            [mono] => (&mono[..n], None),
            [left, right, ..] => (&left[..n], Some(&right[..n])),
            [] => return,
        };

        self.metering.process(
            left,
            right,
            snapshot.sensitivity,
            snapshot.smoothing,
            &self.meters,
        );

        if self.spectrum.push(left, right, snapshot.smoothing) {
            for (band, &value) in self.spectrum.bands().iter().enumerate() {
                self.meters.set_band(band, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::*;

    fn stereo(n: usize) -> (Vec<f32>, Vec<f32>) {
        let l = (0..n).map(|i| 0.4 * (i as f32 * 0.05).sin()).collect();
        let r = (0..n).map(|i| 0.3 * (i as f32 * 0.021).cos()).collect();
        (l, r)
    }

    fn run(proc_: &mut NeonProcessor, l: &mut [f32], r: &mut [f32], params: &ParameterSet) {
        let n = l.len();
        let mut buffer: [&mut [f32]; 2] = [l, r];
        proc_.process(&mut buffer, 2, n, params);
    }

    #[test]
    fn test_visualize_only_passes_through() {
        let mut p = NeonProcessor::new(Arc::new(Meters::new()));
        p.prepare(48000.0, 256, 2);
        let (l0, r0) = stereo(256);
        let (mut l, mut r) = (l0.clone(), r0.clone());
        let mut params = ParameterSet::with_defaults();
        params.set_flag(ID_LIMITER, false);
        run(&mut p, &mut l, &mut r, &params);
        assert_eq!(l, l0);
        assert_eq!(r, r0);
        assert!(p.meters().get_left_level() > 0.0);
    }

    #[test]
    fn test_ramps_start_settled_after_prepare() {
        let mut p = NeonProcessor::new(Arc::new(Meters::new()));
        p.prepare(48000.0, 64, 2);
        let mut params = ParameterSet::with_defaults();
        params.set(ID_DRIVE, 2.5);
        let (mut l, mut r) = stereo(64);
        run(&mut p, &mut l, &mut r, &params);
        assert_eq!(p.ramps.map(|t| t.drive), Some(2.5));
    }

    #[test]
    fn test_band_listen_replaces_output_with_filtered_signal() {
        let mut p = NeonProcessor::new(Arc::new(Meters::new()));
        p.prepare(48000.0, 128, 2);
        let mut params = ParameterSet::with_defaults();
        params
            .set_choice(ID_MODE, Mode::Hybrid)
            .set_flag(ID_BAND_LISTEN, true)
            .set_flag(ID_LIMITER, false)
            .set_choice(ID_SAT_MODE, SatMode::HardClip)
            .set(ID_DRIVE, 3.0);

        let (l0, r0) = stereo(128);
        let (mut l, mut r) = (l0.clone(), r0.clone());
        run(&mut p, &mut l, &mut r, &params);

        let mut filter = StateVariableFilter::new(48000.0);
        filter.update(FilterType::LowPass, DEFAULT_CUTOFF_HZ, DEFAULT_RESONANCE);
        let mut expected = l0.clone();
        filter.process_block(&mut expected);
        for i in 0..128 {
            assert!((l[i] - expected[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_release_then_prepare() {
        let mut p = NeonProcessor::new(Arc::new(Meters::new()));
        p.prepare(44100.0, 32, 2);
        p.release();
        assert_eq!(p.max_block_size(), 0);
        p.prepare(96000.0, 32, 1);
        let mut mono = vec![0.25f32; 32];
        let mut buffer: [&mut [f32]; 1] = [&mut mono];
        p.process(&mut buffer, 1, 32, &ParameterSet::new());
        assert!(mono.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_prepare_and_release_clear_published_meters() {
        let mut p = NeonProcessor::new(Arc::new(Meters::new()));
        p.prepare(48000.0, 64, 2);
        let (mut l, mut r) = stereo(64);
        run(&mut p, &mut l, &mut r, &ParameterSet::with_defaults());
        assert!(p.meters().get_left_level() > 0.0);

        p.release();
        let snap = p.meters().snapshot();
        assert_eq!(snap.left_level, 0.0);
        assert_eq!(snap.left_peak_db, crate::meters::SILENT_DB);

        run(&mut p, &mut l, &mut r, &ParameterSet::with_defaults());
        p.prepare(48000.0, 64, 2);
        assert_eq!(p.meters().snapshot().right_rms_db, crate::meters::SILENT_DB);
        assert_eq!(p.spectrum_frames_analyzed(), 0);
    }
}
