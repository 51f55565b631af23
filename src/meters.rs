//! Thread-safe meter values shared between the audio thread and the editor.
//!
//! Every value is an `f32` stored as `AtomicU32` bits with relaxed ordering.
//! Each cell is individually atomic; a reader may see a mix of old and new
//! values across cells within one poll.

use std::sync::atomic::{AtomicU32, Ordering};

pub const NUM_BANDS: usize = 16;

/// Value shown by the dB readouts before anything was metered.
pub const SILENT_DB: f32 = -100.0;

#[inline]
fn store(cell: &AtomicU32, val: f32) {
    cell.store(val.to_bits(), Ordering::Relaxed);
}

#[inline]
fn load(cell: &AtomicU32) -> f32 {
    f32::from_bits(cell.load(Ordering::Relaxed))
}

pub struct Meters {
    left_level: AtomicU32,
    right_level: AtomicU32,
    left_peak_db: AtomicU32,
    right_peak_db: AtomicU32,
    left_rms_db: AtomicU32,
    right_rms_db: AtomicU32,
    correlation: AtomicU32,
    width: AtomicU32,
    auto_gain_db: AtomicU32,
    limiter_reduction_db: AtomicU32,
    global_level: AtomicU32,
    bands: [AtomicU32; NUM_BANDS],
}

impl Default for Meters {
    fn default() -> Self {
        Self::new()
    }
}

impl Meters {
    pub fn new() -> Self {
        let silent = SILENT_DB.to_bits();
        Self {
            left_level: AtomicU32::new(0),
            right_level: AtomicU32::new(0),
            left_peak_db: AtomicU32::new(silent),
            right_peak_db: AtomicU32::new(silent),
            left_rms_db: AtomicU32::new(silent),
            right_rms_db: AtomicU32::new(silent),
            correlation: AtomicU32::new(0),
            width: AtomicU32::new(0),
            auto_gain_db: AtomicU32::new(0),
            limiter_reduction_db: AtomicU32::new(0),
            global_level: AtomicU32::new(0),
            bands: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Back to the power-on readings.
    pub fn clear(&self) {
        store(&self.left_level, 0.0);
        store(&self.right_level, 0.0);
        store(&self.left_peak_db, SILENT_DB);
        store(&self.right_peak_db, SILENT_DB);
        store(&self.left_rms_db, SILENT_DB);
        store(&self.right_rms_db, SILENT_DB);
        store(&self.correlation, 0.0);
        store(&self.width, 0.0);
        store(&self.auto_gain_db, 0.0);
        store(&self.limiter_reduction_db, 0.0);
        store(&self.global_level, 0.0);
        for band in &self.bands {
            store(band, 0.0);
        }
    }

    pub fn set_levels(&self, left: f32, right: f32) {
        store(&self.left_level, left);
        store(&self.right_level, right);
    }

    pub fn set_peak_db(&self, left: f32, right: f32) {
        store(&self.left_peak_db, left);
        store(&self.right_peak_db, right);
    }

    pub fn set_rms_db(&self, left: f32, right: f32) {
        store(&self.left_rms_db, left);
        store(&self.right_rms_db, right);
    }

    pub fn set_correlation(&self, val: f32) {
        store(&self.correlation, val);
    }

    pub fn set_width(&self, val: f32) {
        store(&self.width, val);
    }

    pub fn set_auto_gain_db(&self, val: f32) {
        store(&self.auto_gain_db, val);
    }

    pub fn set_limiter_reduction_db(&self, val: f32) {
        store(&self.limiter_reduction_db, val);
    }

    pub fn set_global_level(&self, val: f32) {
        store(&self.global_level, val);
    }

    pub fn set_band(&self, band: usize, val: f32) {
        if let Some(cell) = self.bands.get(band) {
            store(cell, val);
        }
    }

    pub fn get_left_level(&self) -> f32 {
        load(&self.left_level)
    }

    pub fn get_right_level(&self) -> f32 {
        load(&self.right_level)
    }

    pub fn get_correlation(&self) -> f32 {
        load(&self.correlation)
    }

    pub fn get_width(&self) -> f32 {
        load(&self.width)
    }

    pub fn get_auto_gain_db(&self) -> f32 {
        load(&self.auto_gain_db)
    }

    pub fn get_limiter_reduction_db(&self) -> f32 {
        load(&self.limiter_reduction_db)
    }

    pub fn get_global_level(&self) -> f32 {
        load(&self.global_level)
    }

    pub fn get_band(&self, band: usize) -> f32 {
        self.bands.get(band).map(load).unwrap_or(0.0)
    }

    pub fn get_bands(&self) -> [f32; NUM_BANDS] {
        std::array::from_fn(|i| load(&self.bands[i]))
    }

    /// Plain copy of every cell, for an editor poll.
    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            left_level: load(&self.left_level),
            right_level: load(&self.right_level),
            left_peak_db: load(&self.left_peak_db),
            right_peak_db: load(&self.right_peak_db),
            left_rms_db: load(&self.left_rms_db),
            right_rms_db: load(&self.right_rms_db),
            correlation: load(&self.correlation),
            width: load(&self.width),
            auto_gain_db: load(&self.auto_gain_db),
            limiter_reduction_db: load(&self.limiter_reduction_db),
            global_level: load(&self.global_level),
            bands: self.get_bands(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    pub left_level: f32,
    pub right_level: f32,
    pub left_peak_db: f32,
    pub right_peak_db: f32,
    pub left_rms_db: f32,
    pub right_rms_db: f32,
    pub correlation: f32,
    pub width: f32,
    pub auto_gain_db: f32,
    pub limiter_reduction_db: f32,
    pub global_level: f32,
    pub bands: [f32; NUM_BANDS],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_readings() {
        let m = Meters::new();
        let snap = m.snapshot();
        assert_eq!(snap.left_peak_db, SILENT_DB);
        assert_eq!(snap.right_rms_db, SILENT_DB);
        assert_eq!(snap.global_level, 0.0);
        assert_eq!(snap.bands, [0.0; NUM_BANDS]);
    }

    #[test]
    fn test_store_and_clear() {
        let m = Meters::new();
        m.set_levels(0.25, 0.75);
        m.set_band(3, 0.5);
        m.set_band(NUM_BANDS, 1.0);
        assert_eq!(m.get_right_level(), 0.75);
        assert_eq!(m.get_band(3), 0.5);
        assert_eq!(m.get_band(NUM_BANDS), 0.0);
        m.clear();
        assert_eq!(m.get_left_level(), 0.0);
        assert_eq!(m.get_band(3), 0.0);
    }
}
