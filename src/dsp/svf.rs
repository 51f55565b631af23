//! State-Variable Filter (TPT / zero-delay feedback)
//!
//! Per-channel tone filter used by the Tone Filter and Hybrid modes. The
//! topology-preserving transform keeps the filter stable under fast cutoff
//! automation, so coefficients are simply recomputed once per block.
//!
//! # Lifecycle
//! - **Prepare**: `set_sample_rate` + `reset` on every prepare.
//! - **Active**: `process` per sample, state carried across blocks.
//! - **Bypassed**: not called; state holds its last value.

use crate::dsp::utils::flush_denormal;
use crate::params::FilterType;
use std::f32::consts::PI;

pub const MIN_CUTOFF_HZ: f32 = 80.0;
pub const MAX_CUTOFF_HZ: f32 = 18_000.0;
pub const MIN_RESONANCE: f32 = 0.2;
pub const MAX_RESONANCE: f32 = 1.5;

#[derive(Debug, Clone, Copy)]
pub struct StateVariableFilter {
    filter_type: FilterType,
    sample_rate: f32,
    // coefficients
    g: f32,
    r2: f32,
    h: f32,
    // integrator state
    s1: f32,
    s2: f32,
}

impl StateVariableFilter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            filter_type: FilterType::LowPass,
            sample_rate,
            g: 0.0,
            r2: 0.0,
            h: 0.0,
            s1: 0.0,
            s2: 0.0,
        };
        filter.update(FilterType::LowPass, 1000.0, 1.0 / std::f32::consts::SQRT_2);
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Recompute coefficients. Cutoff and resonance are clamped into their
    /// safe ranges (cutoff also stays below Nyquist).
    pub fn update(&mut self, filter_type: FilterType, cutoff_hz: f32, resonance: f32) {
        self.filter_type = filter_type;

        let nyquist_guard = 0.49 * self.sample_rate;
        let cutoff = cutoff_hz
            .clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ)
            .min(nyquist_guard);
        let resonance = resonance.clamp(MIN_RESONANCE, MAX_RESONANCE);

        self.g = (PI * cutoff / self.sample_rate).tan();
        self.r2 = 1.0 / resonance;
        self.h = 1.0 / (1.0 + self.r2 * self.g + self.g * self.g);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let high = (input - self.s1 * (self.r2 + self.g) - self.s2) * self.h;

        let band = high * self.g + self.s1;
        self.s1 = flush_denormal(high * self.g + band);

        let low = band * self.g + self.s2;
        self.s2 = flush_denormal(band * self.g + low);

        match self.filter_type {
            FilterType::LowPass => low,
            FilterType::HighPass => high,
            FilterType::BandPass => band,
        }
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }
}
