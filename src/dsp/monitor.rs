//! Monitor-mode routing.
//!
//! Listening aids applied after the gain stages and before the final hard
//! clip. With a single channel only `Mono` does anything, and on one channel
//! it is a no-op in value.

use crate::params::MonitorMode;

pub fn apply_monitor(mode: MonitorMode, channels: &mut [&mut [f32]], num_samples: usize) {
    if mode == MonitorMode::Stereo {
        return;
    }

    let (left, right) = match channels {
        [] => return,
        [mono] => {
            if mode == MonitorMode::Mono {
                for s in mono[..num_samples].iter_mut() {
                    *s = 0.5 * (*s + *s);
                }
            }
            return;
        }
        [left, right, ..] => (&mut left[..num_samples], &mut right[..num_samples]),
    };

    match mode {
        MonitorMode::Stereo => {}
        MonitorMode::Mono | MonitorMode::Mid => {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let mid = 0.5 * (*l + *r);
                *l = mid;
                *r = mid;
            }
        }
        MonitorMode::Left => right.copy_from_slice(left),
        MonitorMode::Right => left.copy_from_slice(right),
        MonitorMode::Side => {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let side = 0.5 * (*l - *r);
                *l = side;
                *r = -side;
            }
        }
    }
}

/// Clamp to full scale; NaN becomes silence.
pub fn hard_clip(channels: &mut [&mut [f32]], num_samples: usize) {
    for channel in channels.iter_mut() {
        for s in channel[..num_samples].iter_mut() {
            *s = if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(mode: MonitorMode, l: &[f32], r: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut a = l.to_vec();
        let mut b = r.to_vec();
        let n = a.len();
        let mut chans: [&mut [f32]; 2] = [&mut a, &mut b];
        apply_monitor(mode, &mut chans, n);
        (a, b)
    }

    #[test]
    fn test_mono_is_identical_average() {
        let (l, r) = run(MonitorMode::Mono, &[1.0, 0.2], &[0.0, -0.6]);
        assert_eq!(l, r);
        assert!((l[0] - 0.5).abs() < 1e-7);
        assert!((l[1] + 0.2).abs() < 1e-7);
    }

    #[test]
    fn test_side_is_antiphase() {
        let (l, r) = run(MonitorMode::Side, &[1.0], &[0.2]);
        assert!((l[0] - 0.4).abs() < 1e-7);
        assert_eq!(r[0], -l[0]);
    }

    #[test]
    fn test_left_and_right_copy() {
        assert_eq!(run(MonitorMode::Left, &[0.3], &[0.9]), (vec![0.3], vec![0.3]));
        assert_eq!(run(MonitorMode::Right, &[0.3], &[0.9]), (vec![0.9], vec![0.9]));
        assert_eq!(run(MonitorMode::Stereo, &[0.3], &[0.9]), (vec![0.3], vec![0.9]));
    }

    #[test]
    fn test_single_channel_untouched_except_mono() {
        for mode in [MonitorMode::Left, MonitorMode::Right, MonitorMode::Side, MonitorMode::Mid] {
            let mut a = vec![0.7f32, -0.1];
            let mut chans: [&mut [f32]; 1] = [&mut a];
            apply_monitor(mode, &mut chans, 2);
            assert_eq!(a, vec![0.7, -0.1]);
        }
    }

    #[test]
    fn test_hard_clip_maps_nan_to_zero() {
        let mut a = vec![f32::NAN, 2.0, -3.0, 0.25, f32::INFINITY];
        let mut chans: [&mut [f32]; 1] = [&mut a];
        hard_clip(&mut chans, 5);
        assert_eq!(a, vec![0.0, 1.0, -1.0, 0.25, 1.0]);
    }
}
