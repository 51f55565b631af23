//! Dry/wet blend and output trim.

use crate::dsp::ramp::BlockRamp;
use crate::dsp::utils::db_to_gain;

/// What the blend did to the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOutcome {
    /// The block is now the dry copy verbatim.
    ReplacedWithDry,
    /// Wet untouched.
    FullyWet,
    Blended,
}

/// Crossfade `wet` toward `dry` with the per-sample wet amount from `mix`.
pub fn blend<D: AsRef<[f32]>>(
    dry: &[D],
    wet: &mut [&mut [f32]],
    num_samples: usize,
    mix: &BlockRamp,
) -> BlendOutcome {
    if mix.is_constant() && mix.target() <= 0.0 {
        copy_dry(dry, wet, num_samples);
        return BlendOutcome::ReplacedWithDry;
    }
    if mix.is_constant() && mix.target() >= 1.0 {
        return BlendOutcome::FullyWet;
    }

    for (d, w) in dry.iter().zip(wet.iter_mut()) {
        let d = &d.as_ref()[..num_samples];
        for (i, (ws, ds)) in w[..num_samples].iter_mut().zip(d).enumerate() {
            let amount = mix.value_at(i);
            *ws = ds * (1.0 - amount) + *ws * amount;
        }
    }
    BlendOutcome::Blended
}

/// Overwrite every channel of `out` with the matching dry channel.
pub fn copy_dry<D: AsRef<[f32]>>(dry: &[D], out: &mut [&mut [f32]], num_samples: usize) {
    for (d, o) in dry.iter().zip(out.iter_mut()) {
        o[..num_samples].copy_from_slice(&d.as_ref()[..num_samples]);
    }
}

/// Apply the ramped output trim, given in dB.
pub fn apply_trim(channels: &mut [&mut [f32]], num_samples: usize, trim_db: &BlockRamp) {
    if trim_db.is_constant() {
        let gain = db_to_gain(trim_db.target());
        if gain == 1.0 {
            return;
        }
        for channel in channels.iter_mut() {
            for s in channel[..num_samples].iter_mut() {
                *s *= gain;
            }
        }
        return;
    }

    for channel in channels.iter_mut() {
        for (i, s) in channel[..num_samples].iter_mut().enumerate() {
            *s *= db_to_gain(trim_db.value_at(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(n: usize, seed: f32) -> Vec<f32> {
        (0..n).map(|i| ((i as f32 + seed) * 0.31).sin()).collect()
    }

    #[test]
    fn test_zero_mix_is_bitwise_dry() {
        let dry = vec![block(64, 0.0), block(64, 3.0)];
        let mut a = block(64, 10.0);
        let mut b = block(64, 20.0);
        let mut wet: [&mut [f32]; 2] = [&mut a, &mut b];
        let outcome = blend(&dry, &mut wet, 64, &BlockRamp::new(0.0, 0.0, 64));
        assert_eq!(outcome, BlendOutcome::ReplacedWithDry);
        assert_eq!(a, dry[0]);
        assert_eq!(b, dry[1]);
    }

    #[test]
    fn test_full_mix_leaves_wet() {
        let dry = vec![block(32, 0.0)];
        let original = block(32, 5.0);
        let mut a = original.clone();
        let mut wet: [&mut [f32]; 1] = [&mut a];
        let outcome = blend(&dry, &mut wet, 32, &BlockRamp::new(1.0, 1.0, 32));
        assert_eq!(outcome, BlendOutcome::FullyWet);
        assert_eq!(a, original);
    }

    #[test]
    fn test_half_mix_averages() {
        let dry = vec![vec![1.0f32; 16]];
        let mut a = vec![0.0f32; 16];
        let mut wet: [&mut [f32]; 1] = [&mut a];
        blend(&dry, &mut wet, 16, &BlockRamp::new(0.5, 0.5, 16));
        assert!(a.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_ramping_mix_reaches_target() {
        let dry = vec![vec![1.0f32; 8]];
        let mut a = vec![0.0f32; 8];
        let mut wet: [&mut [f32]; 1] = [&mut a];
        let outcome = blend(&dry, &mut wet, 8, &BlockRamp::new(0.0, 1.0, 8));
        assert_eq!(outcome, BlendOutcome::Blended);
        assert_eq!(a[0], 1.0);
        assert_eq!(a[7], 0.0);
    }

    #[test]
    fn test_trim() {
        let mut a = vec![1.0f32; 8];
        let mut chans: [&mut [f32]; 1] = [&mut a];
        apply_trim(&mut chans, 8, &BlockRamp::new(-6.0, -6.0, 8));
        assert!((a[0] - db_to_gain(-6.0)).abs() < 1e-6);
    }
}
