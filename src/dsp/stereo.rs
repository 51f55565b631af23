//! Stereo width via mid/side.

use crate::dsp::ramp::BlockRamp;

const INV_SQRT2: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// Scale the side component of a stereo pair by the ramped width.
///
/// Width 1 leaves the pair unchanged (up to rounding), 0 collapses it to
/// mono, 2 doubles the side energy.
pub fn apply_width(left: &mut [f32], right: &mut [f32], width: &BlockRamp) {
    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
        let mid = (*l + *r) * INV_SQRT2;
        let side = (*l - *r) * INV_SQRT2 * width.value_at(i);
        *l = (mid + side) * INV_SQRT2;
        *r = (mid - side) * INV_SQRT2;
    }
}
