//! Auto-Gain Compensation
//!
//! Holds the perceived level of the distortion stage steady by matching the
//! wet RMS to the dry RMS. Block-level: one smoothed factor, one multiply per
//! block.
//!
//! # Lifecycle
//! - **Prepare**: per-sample coefficient derived from the sample rate.
//! - **Engaged**: factor glides toward `dry / wet` and is applied.
//! - **Idle**: factor glides back toward unity and is not applied.

use crate::dsp::utils::{block_coeff, combined_rms, gain_to_db, one_pole_coeff, DB_FLOOR, EPSILON};

const SMOOTHING_SECONDS: f32 = 0.08;
pub const MIN_GAIN: f32 = 0.125;
pub const MAX_GAIN: f32 = 8.0;

#[derive(Debug, Clone, Copy)]
pub struct AutoGain {
    coeff_per_sample: f32,
    gain: f32,
}

impl AutoGain {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            coeff_per_sample: one_pole_coeff(SMOOTHING_SECONDS, sample_rate),
            gain: 1.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.coeff_per_sample = one_pole_coeff(SMOOTHING_SECONDS, sample_rate);
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Smoothed factor in dB for the meters.
    pub fn gain_db(&self) -> f32 {
        gain_to_db(self.gain, DB_FLOOR)
    }

    /// Raw compensation target for one block.
    pub fn target_for(dry_rms: f32, wet_rms: f32) -> f32 {
        if dry_rms > EPSILON && wet_rms > EPSILON {
            (dry_rms / wet_rms.max(EPSILON)).clamp(MIN_GAIN, MAX_GAIN)
        } else {
            1.0
        }
    }

    /// Measure, smooth and apply to `wet` in place.
    pub fn process<D: AsRef<[f32]>>(&mut self, dry: &[D], wet: &mut [&mut [f32]], num_samples: usize) {
        let coeff = block_coeff(self.coeff_per_sample, num_samples);
        let dry_rms = combined_rms(dry, num_samples);
        let wet_rms = combined_rms(&*wet, num_samples);
        let target = Self::target_for(dry_rms, wet_rms);

        self.gain = self.gain * coeff + target * (1.0 - coeff);

        let gain = self.gain;
        for channel in wet.iter_mut() {
            for s in channel[..num_samples].iter_mut() {
                *s *= gain;
            }
        }
    }

    /// Glide back toward unity without touching audio.
    pub fn idle(&mut self, num_samples: usize) {
        let coeff = block_coeff(self.coeff_per_sample, num_samples);
        self.gain = self.gain * coeff + (1.0 - coeff);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_is_clamped() {
        assert_eq!(AutoGain::target_for(1.0, 1e-3), MAX_GAIN);
        assert_eq!(AutoGain::target_for(1e-3, 1.0), MIN_GAIN);
        assert_eq!(AutoGain::target_for(0.0, 0.5), 1.0);
        assert!((AutoGain::target_for(0.5, 0.25) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_converges_to_clamped_ratio() {
        let mut ag = AutoGain::new(48000.0);
        let dry = vec![vec![0.5f32; 512]];
        for _ in 0..2000 {
            let mut wet_l = vec![0.01f32; 512];
            let mut wet: [&mut [f32]; 1] = [&mut wet_l];
            ag.process(&dry, &mut wet, 512);
        }
        assert!((ag.gain() - MAX_GAIN).abs() < 1e-3);
    }

    #[test]
    fn test_idle_decays_to_unity() {
        let mut ag = AutoGain::new(48000.0);
        let dry = vec![vec![0.5f32; 256]];
        let mut wet_l = vec![0.1f32; 256];
        let mut wet: [&mut [f32]; 1] = [&mut wet_l];
        ag.process(&dry, &mut wet, 256);
        assert!(ag.gain() > 1.0);
        for _ in 0..4000 {
            ag.idle(256);
        }
        assert!((ag.gain() - 1.0).abs() < 1e-4);
    }
}
