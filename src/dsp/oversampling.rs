//! Oversampling Subsystem
//!
//! Runs the nonlinear stage at a raised rate so harmonics above Nyquist are
//! filtered instead of folding back.
//!
//! - **1x**: the shaper runs in place.
//! - **2x / 4x**: polyphase IIR halfband stages (two allpass branches of six
//!   first-order sections, 12th-order steep design), one per doubling.
//! - **1.3x / 1.7x**: streaming 4-point Lagrange interpolator pairs with the
//!   phase carried across blocks and a fixed two-sample output delay.
//!
//! # Invariants
//! - Output length always equals input length.
//! - Filter state survives across blocks; it is cleared on `reset` and when
//!   the active factor changes.
//! - No allocation once `prepare` has sized the scratch for the block and
//!   channel count in use. Larger blocks resize under `permit_alloc`.

use crate::dsp::utils::flush_denormal;
use crate::ns_log;
use crate::params::Oversampling;
use assert_no_alloc::permit_alloc;

const SECTIONS: usize = 6;

const PATH_A: [f32; SECTIONS] = [
    0.036_681_502,
    0.274_631_76,
    0.561_098_97,
    0.769_741_83,
    0.892_260_8,
    0.962_094_55,
];

const PATH_B: [f32; SECTIONS] = [
    0.136_547_62,
    0.423_138_62,
    0.677_540_05,
    0.839_889_6,
    0.931_541_96,
    0.987_816_4,
];

/// Largest supported factor; scratch is sized for it up front.
pub const MAX_FACTOR: usize = 4;

// =============================================================================
// HALFBAND
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct AllpassChain {
    x1: [f32; SECTIONS],
    y1: [f32; SECTIONS],
}

impl AllpassChain {
    #[inline]
    fn process(&mut self, coeffs: &[f32; SECTIONS], input: f32) -> f32 {
        let mut x = input;
        for k in 0..SECTIONS {
            let y = coeffs[k] * (x - self.y1[k]) + self.x1[k];
            self.x1[k] = x;
            self.y1[k] = flush_denormal(y);
            x = y;
        }
        x
    }
}

/// One 2x polyphase halfband stage, either direction.
#[derive(Clone, Copy, Debug, Default)]
pub struct HalfbandStage {
    a: AllpassChain,
    b: AllpassChain,
}

impl HalfbandStage {
    /// `output` must hold at least `2 * input.len()` samples.
    pub fn upsample(&mut self, input: &[f32], output: &mut [f32]) {
        for (x, pair) in input.iter().zip(output.chunks_exact_mut(2)) {
            pair[0] = self.a.process(&PATH_A, *x);
            pair[1] = self.b.process(&PATH_B, *x);
        }
    }

    /// `input` must hold at least `2 * output.len()` samples.
    pub fn downsample(&mut self, input: &[f32], output: &mut [f32]) {
        for (y, pair) in output.iter_mut().zip(input.chunks_exact(2)) {
            let even = self.b.process(&PATH_B, pair[0]);
            let odd = self.a.process(&PATH_A, pair[1]);
            *y = 0.5 * (odd + even);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// =============================================================================
// FRACTIONAL
// =============================================================================

/// Streaming 4-point Lagrange resampler.
///
/// `step` is input samples advanced per output sample: below 1 upsamples,
/// above 1 downsamples. Output is driven by the input: each pushed sample
/// emits every output whose position it now covers, so the count per call
/// varies by one from block to block while the phase carries over.
#[derive(Clone, Copy, Debug, Default)]
pub struct FractionalResampler {
    history: [f32; 4],
    position: f64,
}

impl FractionalResampler {
    /// Feed `input`, writing into `output`. Returns the number of samples
    /// produced. Outputs past the end of `output` are dropped.
    pub fn process(&mut self, input: &[f32], output: &mut [f32], step: f64) -> usize {
        let mut written = 0usize;
        for &x in input {
            self.history = [self.history[1], self.history[2], self.history[3], x];
            while self.position < 1.0 {
                if let Some(out) = output.get_mut(written) {
                    *out = lagrange4(&self.history, self.position as f32);
                    written += 1;
                }
                self.position += step;
            }
            self.position -= 1.0;
        }
        written
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Base-rate samples held between blocks on the fractional path.
const CARRY_CAPACITY: usize = 8;
/// Fixed delay that keeps the carry from running dry.
const FRACTIONAL_LATENCY: usize = 2;

/// Queue between the down-resampler and the host block. It starts primed with
/// `FRACTIONAL_LATENCY` zeros; afterwards it holds 1 to 4 samples.
#[derive(Clone, Copy, Debug)]
struct OutputCarry {
    samples: [f32; CARRY_CAPACITY],
    len: usize,
}

impl Default for OutputCarry {
    fn default() -> Self {
        Self {
            samples: [0.0; CARRY_CAPACITY],
            len: FRACTIONAL_LATENCY,
        }
    }
}

impl OutputCarry {
    /// Fill `block` from the carry then `fresh`; keep whatever is left.
    fn emit(&mut self, fresh: &[f32], block: &mut [f32]) {
        let pending = self.samples;
        let mut queued = pending[..self.len].iter().chain(fresh.iter()).copied();
        let mut last = 0.0;
        for out in block.iter_mut() {
            let v = queued.next().unwrap_or(last);
            *out = v;
            last = v;
        }
        self.len = 0;
        for v in queued {
            if self.len < CARRY_CAPACITY {
                self.samples[self.len] = v;
                self.len += 1;
            }
        }
    }
}

/// Interpolate between `h[1]` and `h[2]` at fraction `t`.
#[inline]
fn lagrange4(h: &[f32; 4], t: f32) -> f32 {
    let tm1 = t - 1.0;
    let tm2 = t - 2.0;
    let tp1 = t + 1.0;
    let c0 = -t * tm1 * tm2 / 6.0;
    let c1 = tp1 * tm1 * tm2 * 0.5;
    let c2 = -tp1 * t * tm2 * 0.5;
    let c3 = tp1 * t * tm1 / 6.0;
    c0 * h[0] + c1 * h[1] + c2 * h[2] + c3 * h[3]
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct ChannelState {
    up: [HalfbandStage; 2],
    down: [HalfbandStage; 2],
    frac_up: FractionalResampler,
    frac_down: FractionalResampler,
    carry: OutputCarry,
}

impl ChannelState {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Per-channel oversampling context for the distortion stage.
pub struct Oversampler {
    channels: Vec<ChannelState>,
    upsampled: Vec<f32>,
    intermediate: Vec<f32>,
    max_block: usize,
    active: Oversampling,
}

impl Default for Oversampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Oversampler {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            upsampled: Vec::new(),
            intermediate: Vec::new(),
            max_block: 0,
            active: Oversampling::X1,
        }
    }

    /// Size state and scratch for `num_channels` blocks of up to `max_block`.
    pub fn prepare(&mut self, num_channels: usize, max_block: usize) {
        self.channels.clear();
        self.channels
            .resize(num_channels.max(1), ChannelState::default());
        self.resize_scratch(max_block.max(1));
        self.active = Oversampling::X1;
    }

    pub fn reset(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.reset();
        }
    }

    pub fn release(&mut self) {
        self.channels = Vec::new();
        self.upsampled = Vec::new();
        self.intermediate = Vec::new();
        self.max_block = 0;
    }

    fn resize_scratch(&mut self, max_block: usize) {
        self.max_block = max_block;
        let up_len = max_block * MAX_FACTOR + CARRY_CAPACITY;
        let mid_len = max_block * 2 + CARRY_CAPACITY;
        if self.upsampled.len() != up_len {
            self.upsampled.resize(up_len, 0.0);
        }
        if self.intermediate.len() != mid_len {
            self.intermediate.resize(mid_len, 0.0);
        }
    }

    /// Cold path: only taken when the host exceeds what `prepare` announced.
    fn ensure_capacity(&mut self, num_channels: usize, num_samples: usize) {
        if num_channels > self.channels.len() {
            ns_log!(
                "[OVERSAMPLING] channel state grown {} -> {}",
                self.channels.len(),
                num_channels
            );
            permit_alloc(|| self.channels.resize(num_channels, ChannelState::default()));
        }
        if num_samples > self.max_block {
            ns_log!(
                "[OVERSAMPLING] scratch grown {} -> {}",
                self.max_block,
                num_samples
            );
            permit_alloc(|| self.resize_scratch(num_samples));
        }
    }

    /// Run `shape` over each channel at the rate selected by `mode`.
    ///
    /// `shape` receives the oversampled slice of one channel; its length is
    /// `num_samples` scaled by the factor. Fractional ratios give
    /// `floor(n * factor)` or `ceil(n * factor)` samples depending on the
    /// carried phase, and delay the signal by `FRACTIONAL_LATENCY` samples.
    pub fn process<F>(
        &mut self,
        mode: Oversampling,
        channels: &mut [&mut [f32]],
        num_samples: usize,
        mut shape: F,
    ) where
        F: FnMut(&mut [f32]),
    {
        if num_samples == 0 || channels.is_empty() {
            return;
        }

        if mode != self.active {
            ns_log!("[OVERSAMPLING] {:?} -> {:?}", self.active, mode);
            self.reset();
            self.active = mode;
        }

        if mode == Oversampling::X1 {
            for channel in channels.iter_mut() {
                shape(&mut channel[..num_samples]);
            }
            return;
        }

        self.ensure_capacity(channels.len(), num_samples);

        for (channel, state) in channels.iter_mut().zip(self.channels.iter_mut()) {
            let block = &mut channel[..num_samples];
            match mode {
                Oversampling::X1 => {}
                Oversampling::X2 => {
                    let up = &mut self.upsampled[..num_samples * 2];
                    state.up[0].upsample(block, up);
                    shape(up);
                    state.down[0].downsample(up, block);
                }
                Oversampling::X4 => {
                    let mid = &mut self.intermediate[..num_samples * 2];
                    let up = &mut self.upsampled[..num_samples * 4];
                    state.up[0].upsample(block, mid);
                    state.up[1].upsample(mid, up);
                    shape(up);
                    state.down[1].downsample(up, mid);
                    state.down[0].downsample(mid, block);
                }
                Oversampling::X1_3 | Oversampling::X1_7 => {
                    let factor = mode.factor() as f64;
                    let up_len = state
                        .frac_up
                        .process(block, &mut self.upsampled, 1.0 / factor);
                    let up = &mut self.upsampled[..up_len];
                    shape(up);
                    let down_len = state.frac_down.process(up, &mut self.intermediate, factor);
                    state.carry.emit(&self.intermediate[..down_len], block);
                }
            }
        }
    }
}
