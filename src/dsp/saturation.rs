//! Waveshapers for the distortion stage.
//!
//! Six pure `(sample, drive) -> sample` transforms selected by [`SatMode`].
//! Drive arrives per sample from the block ramp, so nothing here keeps state.
//! All variants stay inside safe analytic domains for drive in `[1, 3]`; the
//! arctangent shaper additionally guards its normaliser so small drives cannot
//! blow up the gain.

use crate::params::SatMode;

const FOLD_THRESHOLD: f32 = 1.0;

impl SatMode {
    #[inline]
    pub fn apply(self, sample: f32, drive: f32) -> f32 {
        match self {
            SatMode::Tanh => tanh_sat(sample, drive),
            SatMode::Soft => soft_sat(sample, drive),
            SatMode::Tube => tube_sat(sample, drive),
            SatMode::Arctan => arctan_sat(sample, drive),
            SatMode::HardClip => hard_clip_sat(sample, drive),
            SatMode::Foldback => foldback_sat(sample, drive),
        }
    }

    /// Shape a whole (possibly oversampled) block with a per-index drive.
    #[inline]
    pub fn apply_block<F: Fn(usize) -> f32>(self, samples: &mut [f32], drive_at: F) {
        for (i, s) in samples.iter_mut().enumerate() {
            *s = self.apply(*s, drive_at(i));
        }
    }
}

#[inline]
fn tanh_sat(x: f32, drive: f32) -> f32 {
    (x * drive).tanh()
}

#[inline]
fn soft_sat(x: f32, drive: f32) -> f32 {
    let y = x * drive.powf(0.65);
    y / (1.0 + y.abs())
}

/// Asymmetric: positive half softer, negative half harder but scaled down.
#[inline]
fn tube_sat(x: f32, drive: f32) -> f32 {
    let y = x * drive.powf(0.7);
    if y > 0.0 {
        (y * 0.7).tanh()
    } else {
        y.tanh() * 0.9
    }
}

#[inline]
fn arctan_sat(x: f32, drive: f32) -> f32 {
    let norm = drive.atan();
    if norm > 0.0 {
        (x * drive).atan() / norm
    } else {
        x
    }
}

#[inline]
fn hard_clip_sat(x: f32, drive: f32) -> f32 {
    (x * drive).clamp(-1.0, 1.0)
}

#[inline]
fn foldback_sat(x: f32, drive: f32) -> f32 {
    let t = FOLD_THRESHOLD;
    let mut y = x * drive;
    if y < -t || y > t {
        // triangle fold, continuous at ±t
        y = (((y - t) % (t * 4.0)).abs() - t * 2.0).abs() - t;
    }
    y.clamp(-t, t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ChoiceIndex;

    #[test]
    fn test_all_modes_bounded_and_finite() {
        for &mode in SatMode::CHOICES {
            for i in -400..=400 {
                let x = i as f32 / 100.0;
                for drive in [1.0, 1.5, 2.0, 3.0] {
                    let y = mode.apply(x, drive);
                    assert!(y.is_finite(), "{mode:?} x={x} d={drive}");
                    if x.abs() <= 1.0 {
                        assert!(y.abs() <= 1.0 + 1e-6, "{mode:?} x={x} d={drive} y={y}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_in_zero_out() {
        for &mode in SatMode::CHOICES {
            assert_eq!(mode.apply(0.0, 2.0), 0.0, "{mode:?}");
        }
    }

    #[test]
    fn test_hard_clip_limits() {
        assert_eq!(SatMode::HardClip.apply(0.5, 3.0), 1.0);
        assert_eq!(SatMode::HardClip.apply(-0.5, 3.0), -1.0);
        assert!((SatMode::HardClip.apply(0.2, 3.0) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_arctan_normalised_to_unity_at_full_scale() {
        for drive in [1.0, 2.0, 3.0] {
            assert!((SatMode::Arctan.apply(1.0, drive) - 1.0).abs() < 1e-6);
        }
        // degenerate drive passes the signal through
        assert_eq!(SatMode::Arctan.apply(0.3, 0.0), 0.3);
    }

    #[test]
    fn test_tube_is_asymmetric() {
        let pos = SatMode::Tube.apply(0.8, 2.0);
        let neg = SatMode::Tube.apply(-0.8, 2.0);
        assert!((pos + neg).abs() > 1e-3);
    }

    #[test]
    fn test_foldback_folds() {
        // 1.5 folds back to 0.5, -1.5 to -0.5
        assert!((SatMode::Foldback.apply(1.5, 1.0) - 0.5).abs() < 1e-6);
        assert!((SatMode::Foldback.apply(-1.5, 1.0) + 0.5).abs() < 1e-6);
        assert!((SatMode::Foldback.apply(0.5, 1.0) - 0.5).abs() < 1e-6);
        // no jump just past the threshold
        assert!((SatMode::Foldback.apply(1.001, 1.0) - 0.999).abs() < 1e-4);
        // full triangle: 3 reaches the negative peak, 5 is back on top
        assert!((SatMode::Foldback.apply(3.0, 1.0) + 1.0).abs() < 1e-6);
        assert!((SatMode::Foldback.apply(5.0, 1.0) - 1.0).abs() < 1e-6);
        assert!((SatMode::Foldback.apply(-3.0, 1.0) - 1.0).abs() < 1e-6);
    }
}
