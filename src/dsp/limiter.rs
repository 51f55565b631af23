//! Safety Limiter
//!
//! # Perceptual Contract
//! - **Target Source**: Final output, after the hard clip.
//! - **Intended Effect**: Keep linked peaks under -0.3 dBFS.
//! - **Failure Modes**:
//!   - Audible ducking when fed a heavily driven, already clipped signal.
//! - **Will Not Do**:
//!   - Look ahead. Attack is instant, so the first over is caught on the
//!     sample it occurs.
//!   - Color the sound below threshold.
//!
//! # Lifecycle
//! - **Active**: linked per-sample gain, instant attack, exponential release.
//! - **Bypassed**: gain pinned at unity, reduction reported as 0 dB.

use crate::dsp::utils::{db_to_gain, gain_to_db, one_pole_coeff, DB_FLOOR, EPSILON};

pub const THRESHOLD_DB: f32 = -0.3;
const RELEASE_SECONDS: f32 = 0.05;

#[derive(Debug, Clone, Copy)]
pub struct SafetyLimiter {
    threshold: f32,
    release: f32,
    gain: f32,
    min_gain: f32,
}

impl SafetyLimiter {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            threshold: db_to_gain(THRESHOLD_DB),
            release: one_pole_coeff(RELEASE_SECONDS, sample_rate),
            gain: 1.0,
            min_gain: 1.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.release = one_pole_coeff(RELEASE_SECONDS, sample_rate);
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
        self.min_gain = 1.0;
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Limit a block in place; channels share one gain.
    pub fn process(&mut self, channels: &mut [&mut [f32]], num_samples: usize) {
        self.min_gain = 1.0;

        for i in 0..num_samples {
            let peak = channels
                .iter()
                .fold(0.0f32, |acc, ch| acc.max(ch[i].abs()));

            let target = if peak > self.threshold {
                self.threshold / (peak + EPSILON)
            } else {
                1.0
            };

            if target < self.gain {
                self.gain = target;
            } else {
                let released = self.gain + (1.0 - self.gain) * (1.0 - self.release);
                self.gain = released.min(target);
            }

            for ch in channels.iter_mut() {
                ch[i] *= self.gain;
            }
            self.min_gain = self.min_gain.min(self.gain);
        }
    }

    /// Bypass: unity gain, nothing to report.
    pub fn bypass(&mut self) {
        self.gain = 1.0;
        self.min_gain = 1.0;
    }

    /// Deepest gain of the last block in dB (0 or negative).
    pub fn reduction_db(&self) -> f32 {
        gain_to_db(self.min_gain, DB_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_attack_on_first_over() {
        let mut lim = SafetyLimiter::new(48000.0);
        let mut l = vec![0.1f32, 0.1, 1.0, 0.1];
        let mut r = vec![0.0f32; 4];
        let mut chans: [&mut [f32]; 2] = [&mut l, &mut r];
        lim.process(&mut chans, 4);
        assert!(l[2].abs() <= lim.threshold() + 1e-6);
        assert_eq!(l[0], 0.1);
        assert!(lim.reduction_db() < 0.0);
    }

    #[test]
    fn test_linked_gain() {
        let mut lim = SafetyLimiter::new(48000.0);
        let mut l = vec![1.0f32];
        let mut r = vec![0.5f32];
        let mut chans: [&mut [f32]; 2] = [&mut l, &mut r];
        lim.process(&mut chans, 1);
        assert!((l[0] / r[0] - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_releases_toward_unity() {
        let mut lim = SafetyLimiter::new(48000.0);
        let mut hit = vec![1.0f32];
        let mut chans: [&mut [f32]; 1] = [&mut hit];
        lim.process(&mut chans, 1);
        let mut quiet = vec![0.01f32; 48000];
        let mut chans: [&mut [f32]; 1] = [&mut quiet];
        lim.process(&mut chans, 48000);
        assert!((quiet[47999] - 0.01).abs() < 1e-6);
        assert!(quiet[1] < 0.01);
    }

    #[test]
    fn test_bypass_reports_zero() {
        let mut lim = SafetyLimiter::new(44100.0);
        let mut hit = vec![1.0f32];
        let mut chans: [&mut [f32]; 1] = [&mut hit];
        lim.process(&mut chans, 1);
        lim.bypass();
        assert_eq!(lim.reduction_db(), 0.0);
    }
}
