/// Guard used for every gain ratio and log conversion in the signal path.
pub const EPSILON: f32 = 1.0e-6;

/// Lowest value any dB conversion may return.
pub const DB_FLOOR: f32 = -120.0;

/// Values below this are flushed to zero in recursive state.
const DENORMAL_LIMIT: f32 = 1.0e-15;

pub fn db_to_gain(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

/// Linear gain to dB, never below `floor_db`.
pub fn gain_to_db(gain: f32, floor_db: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(floor_db)
    } else {
        floor_db
    }
}

/// One-pole coefficient for a time constant given in seconds.
#[inline]
pub fn one_pole_coeff(seconds: f32, sample_rate: f32) -> f32 {
    let samples = (sample_rate as f64 * seconds as f64).max(1.0);
    (-1.0 / samples).exp() as f32
}

/// Per-sample coefficient raised to the block length, for block-rate smoothing.
#[inline]
pub fn block_coeff(per_sample: f32, num_samples: usize) -> f32 {
    per_sample.powi(num_samples.min(i32::MAX as usize) as i32)
}

/// Linear re-map of `value` from one range into another (no clamping).
#[inline]
pub fn map_range(value: f32, src_min: f32, src_max: f32, dst_min: f32, dst_max: f32) -> f32 {
    dst_min + (dst_max - dst_min) * ((value - src_min) / (src_max - src_min))
}

/// Clamp a dB value into `[min_db, max_db]` and express it as 0..1.
pub fn normalise_db(db: f32, min_db: f32, max_db: f32) -> f32 {
    let clipped = db.clamp(min_db, max_db);
    ((clipped - min_db) / (max_db - min_db)).clamp(0.0, 1.0)
}

pub fn round_to_decimals(value: f32, decimals: i32) -> f32 {
    let scale = (10.0f32).powi(decimals);
    if scale <= 0.0 {
        return value;
    }
    (value * scale).round() / scale
}

#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_LIMIT {
        0.0
    } else {
        x
    }
}

/// RMS over the first `num_samples` of every channel combined.
pub fn combined_rms<C: AsRef<[f32]>>(channels: &[C], num_samples: usize) -> f32 {
    let mut sum = 0.0f64;
    let mut total = 0usize;
    for channel in channels {
        for &s in &channel.as_ref()[..num_samples] {
            sum += s as f64 * s as f64;
        }
        total += num_samples;
    }
    if total == 0 {
        return 0.0;
    }
    (sum / total as f64).sqrt() as f32
}
