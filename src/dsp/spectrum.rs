//! Spectrum Analyzer
//!
//! Feeds the mono downmix into a 2048-sample FIFO. Every time it fills, the
//! frame is Hann windowed, transformed, and folded into 16 log-spaced bands
//! that are normalised to 0..1 and smoothed for display.
//!
//! # Lifecycle
//! - **Prepare**: FFT planned unless already held. FIFO, frame, scratch and
//!   window allocated; band bin ranges computed for the sample rate.
//! - **Active**: one analysis per full FIFO, possibly several per block.
//! - **Release**: buffers and plan dropped; `push` is a no-op until the next
//!   `prepare`.
//!
//! The FFT runs in place on a pre-allocated frame with pre-allocated scratch,
//! so analysis never allocates.

use crate::dsp::utils::{gain_to_db, map_range, normalise_db, DB_FLOOR, EPSILON};
use crate::meters::NUM_BANDS;
use crate::params::SMOOTHING_RANGE;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub const FFT_ORDER: usize = 11;
pub const FFT_SIZE: usize = 1 << FFT_ORDER;

const MIN_FREQ_HZ: f32 = 20.0;
const MAX_FREQ_HZ: f32 = 20_000.0;
const SPECTRUM_FLOOR_DB: f32 = -80.0;
const SPECTRUM_CEILING_DB: f32 = -10.0;
const BAND_SMOOTHING_RANGE: (f32, f32) = (0.75, 0.92);

fn make_hann_window(size: usize) -> Vec<f32> {
    let denom = (size.max(2) - 1) as f32;
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
        .collect()
}

/// Half-open bin range `[lo, hi)` per band, never empty.
fn band_bins(sample_rate: f32, fft_size: usize) -> [(usize, usize); NUM_BANDS] {
    let nyquist_bin = fft_size / 2;
    let ratio = MAX_FREQ_HZ / MIN_FREQ_HZ;
    std::array::from_fn(|band| {
        let low_hz = MIN_FREQ_HZ * ratio.powf(band as f32 / NUM_BANDS as f32);
        let high_hz = MIN_FREQ_HZ * ratio.powf((band + 1) as f32 / NUM_BANDS as f32);
        let lo = ((low_hz * fft_size as f32 / sample_rate) as usize)
            .max(1)
            .min(nyquist_bin);
        let hi = ((high_hz * fft_size as f32 / sample_rate) as usize).min(nyquist_bin);
        (lo, hi.max(lo + 1))
    })
}

pub struct SpectrumAnalyzer {
    fft: Option<Arc<dyn Fft<f32>>>,
    window: Vec<f32>,
    fifo: Vec<f32>,
    fifo_index: usize,
    frame: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bins: [(usize, usize); NUM_BANDS],
    bands: [f32; NUM_BANDS],
    frames_analyzed: u64,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self {
            fft: None,
            window: Vec::new(),
            fifo: Vec::new(),
            fifo_index: 0,
            frame: Vec::new(),
            scratch: Vec::new(),
            bins: [(1, 2); NUM_BANDS],
            bands: [0.0; NUM_BANDS],
            frames_analyzed: 0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        if self.fft.is_none() {
            let mut planner = FftPlanner::<f32>::new();
            self.fft = Some(planner.plan_fft_forward(FFT_SIZE));
        }
        let scratch_len = self
            .fft
            .as_ref()
            .map_or(0, |fft| fft.get_inplace_scratch_len());

        self.window = make_hann_window(FFT_SIZE);
        self.fifo = vec![0.0; FFT_SIZE];
        self.frame = vec![Complex::new(0.0, 0.0); FFT_SIZE];
        self.scratch = vec![Complex::new(0.0, 0.0); scratch_len];
        self.bins = band_bins(sample_rate.max(1.0), FFT_SIZE);
        self.reset();
    }

    pub fn release(&mut self) {
        *self = Self::new();
    }

    pub fn is_prepared(&self) -> bool {
        self.fft.is_some()
    }

    pub fn reset(&mut self) {
        self.fifo.fill(0.0);
        self.fifo_index = 0;
        self.bands = [0.0; NUM_BANDS];
        self.frames_analyzed = 0;
    }

    pub fn bands(&self) -> &[f32; NUM_BANDS] {
        &self.bands
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    /// Push the downmix of `left` (and `right`, if any). Returns true when at
    /// least one analysis frame completed.
    pub fn push(&mut self, left: &[f32], right: Option<&[f32]>, smoothing: f32) -> bool {
        if self.fifo.len() < FFT_SIZE {
            return false;
        }
        let mut analyzed = false;
        for (i, &l) in left.iter().enumerate() {
            let sample = match right {
                Some(r) => 0.5 * (l + r[i]),
                None => l,
            };
            self.fifo[self.fifo_index] = sample;
            self.fifo_index += 1;
            if self.fifo_index >= FFT_SIZE {
                self.fifo_index = 0;
                self.analyze(smoothing);
                analyzed = true;
            }
        }
        analyzed
    }

    fn analyze(&mut self, smoothing: f32) {
        let Some(fft) = &self.fft else {
            return;
        };
        for ((bin, &s), &w) in self.frame.iter_mut().zip(&self.fifo).zip(&self.window) {
            *bin = Complex::new(s * w, 0.0);
        }
        fft.process_with_scratch(&mut self.frame, &mut self.scratch);

        let keep = map_range(
            smoothing,
            SMOOTHING_RANGE.0,
            SMOOTHING_RANGE.1,
            BAND_SMOOTHING_RANGE.0,
            BAND_SMOOTHING_RANGE.1,
        );

        for (band, &(lo, hi)) in self.bins.iter().enumerate() {
            let sum: f32 = self.frame[lo..hi].iter().map(|c| c.norm()).sum();
            let mean = sum / (hi - lo) as f32;
            let db = gain_to_db(mean / FFT_SIZE as f32 + EPSILON, DB_FLOOR);
            let level = normalise_db(db, SPECTRUM_FLOOR_DB, SPECTRUM_CEILING_DB);
            let smoothed = self.bands[band] * keep + level * (1.0 - keep);
            self.bands[band] = smoothed.clamp(0.0, 1.0);
        }

        self.frames_analyzed += 1;
    }
}
