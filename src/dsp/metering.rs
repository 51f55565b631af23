//! Metering Engine
//!
//! Turns one processed block into the published meter readings: per-channel
//! peak and RMS in dB, normalised levels with attack/release ballistics,
//! stereo correlation and a width ratio.
//!
//! Sums are accumulated in `f64` so long blocks of quiet material do not lose
//! precision. A single channel meters as left == right.

use crate::dsp::utils::{
    block_coeff, gain_to_db, map_range, normalise_db, one_pole_coeff, round_to_decimals,
    DB_FLOOR, EPSILON,
};
use crate::meters::Meters;
use crate::params::SMOOTHING_RANGE;

pub const METER_FLOOR_DB: f32 = -60.0;
pub const METER_CEILING_DB: f32 = 0.0;
pub const PEAK_CEILING_DB: f32 = 6.0;

const RMS_RELEASE_SECONDS: f32 = 0.05;
const ATTACK_RANGE: (f32, f32) = (0.45, 0.2);
const RELEASE_RANGE: (f32, f32) = (0.08, 0.03);

/// Block statistics before any smoothing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockStats {
    pub peak: [f32; 2],
    pub rms: [f32; 2],
    pub correlation: f32,
    pub width: f32,
}

impl BlockStats {
    pub fn measure(left: &[f32], right: Option<&[f32]>) -> Self {
        let mut peak = [0.0f32; 2];
        let mut sum_l = 0.0f64;
        let mut sum_r = 0.0f64;
        let mut sum_lr = 0.0f64;
        let mut sum_mid = 0.0f64;
        let mut sum_side = 0.0f64;

        for (i, &l) in left.iter().enumerate() {
            let r = right.map_or(l, |r| r[i]);
            peak[0] = peak[0].max(l.abs());
            peak[1] = peak[1].max(r.abs());

            let (l64, r64) = (l as f64, r as f64);
            sum_l += l64 * l64;
            sum_r += r64 * r64;
            sum_lr += l64 * r64;

            let mid = 0.5 * (l + r);
            let side = 0.5 * (l - r);
            sum_mid += mid as f64 * mid as f64;
            sum_side += side as f64 * side as f64;
        }

        let n = left.len().max(1) as f64;
        let denom = (EPSILON as f64).max(sum_l * sum_r).sqrt();
        let correlation = if denom > 0.0 {
            (sum_lr / denom) as f32
        } else {
            0.0
        };
        let width = if sum_mid > 0.0 {
            (sum_side / sum_mid) as f32
        } else {
            0.0
        };

        Self {
            peak,
            rms: [(sum_l / n).sqrt() as f32, (sum_r / n).sqrt() as f32],
            correlation: correlation.clamp(-1.0, 1.0),
            width: width.clamp(0.0, 1.0),
        }
    }
}

#[inline]
fn ballistics(current: f32, target: f32, attack: f32, release: f32) -> f32 {
    let k = if target >= current { attack } else { release };
    current + (target - current) * k
}

pub struct MeteringEngine {
    rms_release_per_sample: f32,
    rms_state: [f32; 2],
    levels: [f32; 2],
}

impl MeteringEngine {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            rms_release_per_sample: one_pole_coeff(RMS_RELEASE_SECONDS, sample_rate),
            rms_state: [0.0; 2],
            levels: [0.0; 2],
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.rms_release_per_sample = one_pole_coeff(RMS_RELEASE_SECONDS, sample_rate);
    }

    pub fn reset(&mut self) {
        self.rms_state = [0.0; 2];
        self.levels = [0.0; 2];
    }

    /// Measure `left`/`right` and publish everything into `meters`.
    pub fn process(
        &mut self,
        left: &[f32],
        right: Option<&[f32]>,
        sensitivity: f32,
        smoothing: f32,
        meters: &Meters,
    ) {
        let stats = BlockStats::measure(left, right);

        let release = block_coeff(self.rms_release_per_sample, left.len());
        for (state, &rms) in self.rms_state.iter_mut().zip(&stats.rms) {
            // instant rise, exponential fall
            *state = if rms >= *state {
                rms
            } else {
                rms + (*state - rms) * release
            };
        }

        let offset_db = gain_to_db(sensitivity, DB_FLOOR);
        let attack = map_range(
            smoothing,
            SMOOTHING_RANGE.0,
            SMOOTHING_RANGE.1,
            ATTACK_RANGE.0,
            ATTACK_RANGE.1,
        );
        let fall = map_range(
            smoothing,
            SMOOTHING_RANGE.0,
            SMOOTHING_RANGE.1,
            RELEASE_RANGE.0,
            RELEASE_RANGE.1,
        );

        let mut rms_db = [0.0f32; 2];
        let mut peak_db = [0.0f32; 2];
        for ch in 0..2 {
            rms_db[ch] = (gain_to_db(self.rms_state[ch] + EPSILON, DB_FLOOR) + offset_db)
                .clamp(METER_FLOOR_DB, METER_CEILING_DB);
            peak_db[ch] = (gain_to_db(stats.peak[ch] + EPSILON, DB_FLOOR) + offset_db)
                .clamp(METER_FLOOR_DB, PEAK_CEILING_DB);

            let norm = normalise_db(rms_db[ch], METER_FLOOR_DB, METER_CEILING_DB);
            self.levels[ch] = ballistics(self.levels[ch], norm, attack, fall);
        }

        meters.set_levels(self.levels[0], self.levels[1]);
        meters.set_peak_db(
            round_to_decimals(peak_db[0], 1),
            round_to_decimals(peak_db[1], 1),
        );
        meters.set_rms_db(
            round_to_decimals(rms_db[0], 1),
            round_to_decimals(rms_db[1], 1),
        );
        meters.set_correlation(stats.correlation);
        meters.set_width(stats.width);
        meters.set_global_level((0.5 * (self.levels[0] + self.levels[1])).clamp(0.0, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_channels_correlate() {
        let x: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        let stats = BlockStats::measure(&x, Some(&x));
        assert!((stats.correlation - 1.0).abs() < 1e-4);
        assert_eq!(stats.width, 0.0);
    }

    #[test]
    fn test_inverted_channels_anticorrelate() {
        let x: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        let y: Vec<f32> = x.iter().map(|v| -v).collect();
        let stats = BlockStats::measure(&x, Some(&y));
        assert!((stats.correlation + 1.0).abs() < 1e-4);
        // no mid energy at all
        assert_eq!(stats.width, 0.0);
    }

    #[test]
    fn test_silence_is_guarded() {
        let z = vec![0.0f32; 64];
        let stats = BlockStats::measure(&z, Some(&z));
        assert_eq!(stats.correlation, 0.0);
        assert_eq!(stats.rms, [0.0, 0.0]);
    }

    #[test]
    fn test_publishes_clamped_rounded_db() {
        let meters = Meters::new();
        let mut engine = MeteringEngine::new(48000.0);
        let full = vec![1.0f32; 512];
        engine.process(&full, None, 4.0, 0.7, &meters);
        let snap = meters.snapshot();
        assert_eq!(snap.left_rms_db, METER_CEILING_DB);
        assert_eq!(snap.left_peak_db, PEAK_CEILING_DB);
        assert_eq!(snap.left_peak_db, snap.right_peak_db);

        let quiet = vec![0.01f32; 512];
        let mut engine = MeteringEngine::new(48000.0);
        engine.process(&quiet, None, 1.0, 0.7, &meters);
        let snap = meters.snapshot();
        assert!((snap.left_rms_db + 40.0).abs() < 0.11, "{}", snap.left_rms_db);
        assert_eq!(snap.left_rms_db, round_to_decimals(snap.left_rms_db, 1));
    }

    #[test]
    fn test_rms_rises_instantly_and_falls_slowly() {
        let meters = Meters::new();
        let mut engine = MeteringEngine::new(48000.0);
        engine.process(&vec![0.5f32; 512], None, 1.0, 0.0, &meters);
        let loud = engine.rms_state[0];
        assert!((loud - 0.5).abs() < 1e-6);
        engine.process(&vec![0.0f32; 512], None, 1.0, 0.0, &meters);
        assert!(engine.rms_state[0] > 0.0 && engine.rms_state[0] < loud);
    }

    #[test]
    fn test_levels_follow_ballistics() {
        let meters = Meters::new();
        let mut engine = MeteringEngine::new(48000.0);
        let full = vec![1.0f32; 256];
        engine.process(&full, Some(&full), 1.0, 0.0, &meters);
        // first block moves 45% of the way toward full scale
        assert!((meters.get_left_level() - 0.45).abs() < 1e-3);
        assert!((meters.get_global_level() - meters.get_left_level()).abs() < 1e-6);
    }
}
