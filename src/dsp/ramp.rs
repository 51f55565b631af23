//! Block Ramp
//!
//! Per-sample linear interpolation of a control value across one block, from
//! the value the previous block settled on to the newly read target. Drive,
//! mix, output trim and width all move through one of these so automation
//! never steps audibly.
//!
//! # Invariants
//! - `value_at(0) == start` and `value_at(n - 1) == target` for `n > 1`.
//! - For `n <= 1` every index returns `target`.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockRamp {
    start: f32,
    target: f32,
    increment: f32,
    total_samples: usize,
}

impl BlockRamp {
    pub fn new(start: f32, target: f32, total_samples: usize) -> Self {
        let increment = if total_samples <= 1 {
            0.0
        } else {
            (target - start) / (total_samples - 1) as f32
        };
        Self {
            start,
            target,
            increment,
            total_samples,
        }
    }

    /// The value the ramp settles on; persisted as next block's start.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True when every sample of the block sees the same value.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.total_samples <= 1 || self.start == self.target
    }

    #[inline]
    pub fn value_at(&self, index: usize) -> f32 {
        if self.total_samples <= 1 {
            return self.target;
        }
        let last = self.total_samples - 1;
        if index >= last {
            // exact endpoint, no accumulated rounding
            return self.target;
        }
        self.start + self.increment * index as f32
    }

    /// Ramp value for a sample index at an oversampled rate, mapped back onto
    /// the original block's time base.
    #[inline]
    pub fn value_for_oversampled_index(&self, oversampled_index: usize, factor: f32) -> f32 {
        if self.total_samples <= 1 {
            return self.target;
        }
        if factor <= 1.0 {
            return self.value_at(oversampled_index);
        }
        let original = (oversampled_index as f32 / factor).floor() as usize;
        self.value_at(original.min(self.total_samples - 1))
    }
}
