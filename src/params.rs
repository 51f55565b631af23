//! Parameter model shared by the host shell, the processor and the editor.
//!
//! The processor never talks to a concrete parameter store. Once per block it
//! builds a [`ParameterSnapshot`] from anything implementing [`ParamSource`]:
//! the nih-plug [`NeonParams`](crate::NeonParams) in a host, or a flat
//! [`ParameterSet`] in tests and offline tools. Missing, unbound or NaN
//! values fall back to the defaults below and out-of-range values are
//! clamped; reading a snapshot never fails.

use anyhow::Context;
use nih_plug::prelude::Enum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// -----------------------------------------------------------------------------
// IDS
// -----------------------------------------------------------------------------
pub const ID_MODE: &str = "mode";
pub const ID_FILTER_TYPE: &str = "filterType";
pub const ID_CUTOFF: &str = "cutoff";
pub const ID_RESONANCE: &str = "resonance";
pub const ID_DRIVE: &str = "drive";
pub const ID_SAT_MODE: &str = "satMode";
pub const ID_WIDTH: &str = "width";
pub const ID_MIX: &str = "mix";
pub const ID_OUTPUT_TRIM: &str = "outputTrim";
pub const ID_OVERSAMPLING: &str = "oversampling";
pub const ID_SENSITIVITY: &str = "sensitivity";
pub const ID_SMOOTHING: &str = "smoothing";
pub const ID_AUTO_GAIN: &str = "autoGainEnabled";
pub const ID_LIMITER: &str = "limiterEnabled";
pub const ID_BAND_LISTEN: &str = "bandListenEnabled";
pub const ID_MONITOR_MODE: &str = "monitorMode";

/// Every parameter id, in declaration order.
pub const ALL_IDS: [&str; 16] = [
    ID_MODE,
    ID_FILTER_TYPE,
    ID_CUTOFF,
    ID_RESONANCE,
    ID_DRIVE,
    ID_SAT_MODE,
    ID_WIDTH,
    ID_MIX,
    ID_OUTPUT_TRIM,
    ID_OVERSAMPLING,
    ID_SENSITIVITY,
    ID_SMOOTHING,
    ID_AUTO_GAIN,
    ID_LIMITER,
    ID_BAND_LISTEN,
    ID_MONITOR_MODE,
];

// -----------------------------------------------------------------------------
// DEFAULTS AND RANGES
// -----------------------------------------------------------------------------
pub const DEFAULT_CUTOFF_HZ: f32 = 8000.0;
pub const DEFAULT_RESONANCE: f32 = 0.7;
pub const DEFAULT_DRIVE: f32 = 1.5;
pub const DEFAULT_WIDTH: f32 = 1.0;
pub const DEFAULT_MIX: f32 = 1.0;
pub const DEFAULT_OUTPUT_TRIM_DB: f32 = 0.0;
pub const DEFAULT_SENSITIVITY: f32 = 1.0;
pub const DEFAULT_SMOOTHING: f32 = 0.7;

pub const DRIVE_RANGE: (f32, f32) = (1.0, 3.0);
pub const WIDTH_RANGE: (f32, f32) = (0.0, 2.0);
pub const MIX_RANGE: (f32, f32) = (0.0, 1.0);
pub const OUTPUT_TRIM_RANGE_DB: (f32, f32) = (-12.0, 6.0);
pub const SENSITIVITY_RANGE: (f32, f32) = (0.1, 4.0);
pub const SMOOTHING_RANGE: (f32, f32) = (0.0, 0.95);

// =============================================================================
// CHOICE PARAMETERS
// =============================================================================

/// Which stages of the chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum Mode {
    #[name = "Visualize Only"]
    VisualizeOnly,
    #[name = "Tone Filter"]
    ToneFilter,
    #[name = "Soft Distortion"]
    SoftDistortion,
    #[name = "Hybrid"]
    Hybrid,
}

impl Mode {
    pub fn processing_active(self) -> bool {
        self != Mode::VisualizeOnly
    }

    pub fn filter_active(self) -> bool {
        matches!(self, Mode::ToneFilter | Mode::Hybrid)
    }

    pub fn distortion_active(self) -> bool {
        matches!(self, Mode::SoftDistortion | Mode::Hybrid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum FilterType {
    #[name = "Low-pass"]
    LowPass,
    #[name = "High-pass"]
    HighPass,
    #[name = "Band-pass"]
    BandPass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum SatMode {
    #[name = "Tanh"]
    Tanh,
    #[name = "Soft"]
    Soft,
    #[name = "Tube"]
    Tube,
    #[name = "Arctan"]
    Arctan,
    #[name = "Hard Clip"]
    HardClip,
    #[name = "Foldback"]
    Foldback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum Oversampling {
    #[name = "1x"]
    X1,
    #[name = "1.3x"]
    X1_3,
    #[name = "1.7x"]
    X1_7,
    #[name = "2x"]
    X2,
    #[name = "4x"]
    X4,
}

impl Oversampling {
    pub fn factor(self) -> f32 {
        match self {
            Oversampling::X1 => 1.0,
            Oversampling::X1_3 => 1.3,
            Oversampling::X1_7 => 1.7,
            Oversampling::X2 => 2.0,
            Oversampling::X4 => 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
#[repr(usize)]
pub enum MonitorMode {
    #[name = "Stereo"]
    Stereo,
    #[name = "Mono"]
    Mono,
    #[name = "Left"]
    Left,
    #[name = "Right"]
    Right,
    #[name = "Mid"]
    Mid,
    #[name = "Side"]
    Side,
}

/// Choice parameters travel through the key-value contract as their index.
pub trait ChoiceIndex: Sized + Copy + Default + 'static {
    const CHOICES: &'static [Self];

    fn index(self) -> usize;

    /// Round, clamp into the valid index range; NaN gives the default.
    fn from_raw(raw: f32) -> Self {
        if raw.is_nan() {
            return Self::default();
        }
        let idx = raw.round().clamp(0.0, (Self::CHOICES.len() - 1) as f32) as usize;
        Self::CHOICES[idx]
    }
}

macro_rules! choice_index {
    ($ty:ty, [$($variant:expr),+ $(,)?]) => {
        impl ChoiceIndex for $ty {
            const CHOICES: &'static [Self] = &[$($variant),+];

            fn index(self) -> usize {
                self as usize
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::CHOICES[0]
            }
        }
    };
}

choice_index!(
    Mode,
    [Mode::VisualizeOnly, Mode::ToneFilter, Mode::SoftDistortion, Mode::Hybrid]
);
choice_index!(
    FilterType,
    [FilterType::LowPass, FilterType::HighPass, FilterType::BandPass]
);
choice_index!(
    SatMode,
    [
        SatMode::Tanh,
        SatMode::Soft,
        SatMode::Tube,
        SatMode::Arctan,
        SatMode::HardClip,
        SatMode::Foldback,
    ]
);
choice_index!(
    Oversampling,
    [
        Oversampling::X1,
        Oversampling::X1_3,
        Oversampling::X1_7,
        Oversampling::X2,
        Oversampling::X4,
    ]
);
choice_index!(
    MonitorMode,
    [
        MonitorMode::Stereo,
        MonitorMode::Mono,
        MonitorMode::Left,
        MonitorMode::Right,
        MonitorMode::Mid,
        MonitorMode::Side,
    ]
);

// =============================================================================
// READ CONTRACT
// =============================================================================

/// Anything the processor can read named parameter values from.
///
/// Values are plain (unnormalised): Hz, dB, gain, choice index, or 0/1 for
/// toggles. `None` means "not bound"; the snapshot substitutes the default.
pub trait ParamSource {
    fn raw_value(&self, id: &str) -> Option<f32>;
}

/// One block's worth of control values, already clamped and defaulted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub mode: Mode,
    pub filter_type: FilterType,
    pub cutoff_hz: f32,
    pub resonance: f32,
    pub drive: f32,
    pub sat_mode: SatMode,
    pub width: f32,
    pub mix: f32,
    pub output_trim_db: f32,
    pub oversampling: Oversampling,
    pub sensitivity: f32,
    pub smoothing: f32,
    pub auto_gain_enabled: bool,
    pub limiter_enabled: bool,
    pub band_listen_enabled: bool,
    pub monitor_mode: MonitorMode,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            filter_type: FilterType::default(),
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            resonance: DEFAULT_RESONANCE,
            drive: DEFAULT_DRIVE,
            sat_mode: SatMode::default(),
            width: DEFAULT_WIDTH,
            mix: DEFAULT_MIX,
            output_trim_db: DEFAULT_OUTPUT_TRIM_DB,
            oversampling: Oversampling::default(),
            sensitivity: DEFAULT_SENSITIVITY,
            smoothing: DEFAULT_SMOOTHING,
            auto_gain_enabled: true,
            limiter_enabled: true,
            band_listen_enabled: false,
            monitor_mode: MonitorMode::default(),
        }
    }
}

impl ParameterSnapshot {
    pub fn read<P: ParamSource + ?Sized>(source: &P) -> Self {
        let d = Self::default();

        let float = |id: &str, default: f32| -> f32 {
            match source.raw_value(id) {
                Some(v) if v.is_finite() => v,
                _ => default,
            }
        };
        let toggle = |id: &str, default: bool| -> bool {
            match source.raw_value(id) {
                Some(v) if !v.is_nan() => v >= 0.5,
                _ => default,
            }
        };
        let choice = |id: &str| -> f32 { source.raw_value(id).unwrap_or(f32::NAN) };

        Self {
            mode: Mode::from_raw(choice(ID_MODE)),
            filter_type: FilterType::from_raw(choice(ID_FILTER_TYPE)),
            // cutoff and resonance are clamped by the filter itself
            cutoff_hz: float(ID_CUTOFF, d.cutoff_hz),
            resonance: float(ID_RESONANCE, d.resonance),
            drive: float(ID_DRIVE, d.drive).clamp(DRIVE_RANGE.0, DRIVE_RANGE.1),
            sat_mode: SatMode::from_raw(choice(ID_SAT_MODE)),
            width: float(ID_WIDTH, d.width).clamp(WIDTH_RANGE.0, WIDTH_RANGE.1),
            mix: float(ID_MIX, d.mix).clamp(MIX_RANGE.0, MIX_RANGE.1),
            output_trim_db: float(ID_OUTPUT_TRIM, d.output_trim_db)
                .clamp(OUTPUT_TRIM_RANGE_DB.0, OUTPUT_TRIM_RANGE_DB.1),
            oversampling: Oversampling::from_raw(choice(ID_OVERSAMPLING)),
            sensitivity: float(ID_SENSITIVITY, d.sensitivity)
                .clamp(SENSITIVITY_RANGE.0, SENSITIVITY_RANGE.1),
            smoothing: float(ID_SMOOTHING, d.smoothing)
                .clamp(SMOOTHING_RANGE.0, SMOOTHING_RANGE.1),
            auto_gain_enabled: toggle(ID_AUTO_GAIN, d.auto_gain_enabled),
            limiter_enabled: toggle(ID_LIMITER, d.limiter_enabled),
            band_listen_enabled: toggle(ID_BAND_LISTEN, d.band_listen_enabled),
            monitor_mode: MonitorMode::from_raw(choice(ID_MONITOR_MODE)),
        }
    }

    /// Plain value of one parameter by id, as it would be stored.
    pub fn raw_value_of(&self, id: &str) -> Option<f32> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let v = match id {
            ID_MODE => self.mode.index() as f32,
            ID_FILTER_TYPE => self.filter_type.index() as f32,
            ID_CUTOFF => self.cutoff_hz,
            ID_RESONANCE => self.resonance,
            ID_DRIVE => self.drive,
            ID_SAT_MODE => self.sat_mode.index() as f32,
            ID_WIDTH => self.width,
            ID_MIX => self.mix,
            ID_OUTPUT_TRIM => self.output_trim_db,
            ID_OVERSAMPLING => self.oversampling.index() as f32,
            ID_SENSITIVITY => self.sensitivity,
            ID_SMOOTHING => self.smoothing,
            ID_AUTO_GAIN => flag(self.auto_gain_enabled),
            ID_LIMITER => flag(self.limiter_enabled),
            ID_BAND_LISTEN => flag(self.band_listen_enabled),
            ID_MONITOR_MODE => self.monitor_mode.index() as f32,
            _ => return None,
        };
        Some(v)
    }
}

impl ParamSource for ParameterSnapshot {
    fn raw_value(&self, id: &str) -> Option<f32> {
        self.raw_value_of(id)
    }
}

// =============================================================================
// KEY-VALUE PARAMETER SET
// =============================================================================

/// Flat, name-keyed parameter store that round-trips through JSON.
///
/// Unknown keys are kept (so newer state loads into older builds without
/// loss) but ignored by the processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, f32>,
}

impl ParameterSet {
    /// An empty set: every read falls back to the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding every parameter at its default value.
    pub fn with_defaults() -> Self {
        Self::from_snapshot(&ParameterSnapshot::default())
    }

    pub fn from_snapshot(snapshot: &ParameterSnapshot) -> Self {
        Self::capture(snapshot)
    }

    /// Copy every known parameter out of any source.
    pub fn capture<P: ParamSource + ?Sized>(source: &P) -> Self {
        let mut set = Self::new();
        for id in ALL_IDS {
            if let Some(v) = source.raw_value(id) {
                set.values.insert(id.to_string(), v);
            }
        }
        set
    }

    pub fn set(&mut self, id: &str, value: f32) -> &mut Self {
        self.values.insert(id.to_string(), value);
        self
    }

    pub fn set_choice<C: ChoiceIndex>(&mut self, id: &str, choice: C) -> &mut Self {
        self.set(id, choice.index() as f32)
    }

    pub fn set_flag(&mut self, id: &str, on: bool) -> &mut Self {
        self.set(id, if on { 1.0 } else { 0.0 })
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.values.get(id).copied()
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize parameter set")
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let set: Self =
            serde_json::from_str(json).context("Failed to parse parameter set JSON")?;
        for key in set.values.keys() {
            if !ALL_IDS.contains(&key.as_str()) {
                log::warn!("Ignoring unknown parameter '{}' in parameter set", key);
            }
        }
        Ok(set)
    }
}

impl ParamSource for ParameterSet {
    fn raw_value(&self, id: &str) -> Option<f32> {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_gives_defaults() {
        let snap = ParameterSnapshot::read(&ParameterSet::new());
        assert_eq!(snap, ParameterSnapshot::default());
    }

    #[test]
    fn test_nan_falls_back_to_default() {
        let mut set = ParameterSet::new();
        set.set(ID_CUTOFF, f32::NAN)
            .set(ID_DRIVE, f32::INFINITY)
            .set(ID_MODE, f32::NAN)
            .set(ID_LIMITER, f32::NAN);
        let snap = ParameterSnapshot::read(&set);
        assert_eq!(snap.cutoff_hz, DEFAULT_CUTOFF_HZ);
        assert_eq!(snap.drive, DEFAULT_DRIVE);
        assert_eq!(snap.mode, Mode::VisualizeOnly);
        assert!(snap.limiter_enabled);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut set = ParameterSet::new();
        set.set(ID_DRIVE, 50.0)
            .set(ID_WIDTH, -3.0)
            .set(ID_MIX, 1.5)
            .set(ID_MONITOR_MODE, 42.0)
            .set(ID_SAT_MODE, -1.0);
        let snap = ParameterSnapshot::read(&set);
        assert_eq!(snap.drive, 3.0);
        assert_eq!(snap.width, 0.0);
        assert_eq!(snap.mix, 1.0);
        assert_eq!(snap.monitor_mode, MonitorMode::Side);
        assert_eq!(snap.sat_mode, SatMode::Tanh);
    }

    #[test]
    fn test_choice_index_round_trip() {
        for (i, mode) in SatMode::CHOICES.iter().enumerate() {
            assert_eq!(mode.index(), i);
            assert_eq!(SatMode::from_raw(i as f32), *mode);
        }
        assert_eq!(Oversampling::from_raw(2.4), Oversampling::X1_7);
    }

    #[test]
    fn test_mode_activity() {
        assert!(!Mode::VisualizeOnly.processing_active());
        assert!(Mode::ToneFilter.filter_active() && !Mode::ToneFilter.distortion_active());
        assert!(Mode::SoftDistortion.distortion_active() && !Mode::SoftDistortion.filter_active());
        assert!(Mode::Hybrid.filter_active() && Mode::Hybrid.distortion_active());
    }

    #[test]
    fn test_json_round_trip_by_name() {
        let mut set = ParameterSet::with_defaults();
        set.set_choice(ID_MODE, Mode::Hybrid)
            .set(ID_CUTOFF, 1234.5)
            .set_flag(ID_BAND_LISTEN, true)
            .set_choice(ID_MONITOR_MODE, MonitorMode::Mid);

        let json = set.to_json().unwrap();
        let restored = ParameterSet::from_json(&json).unwrap();
        assert_eq!(restored, set);
        assert!(ALL_IDS.iter().all(|id| restored.get(id).is_some()));
        for id in ALL_IDS {
            assert_eq!(restored.get(id), set.get(id), "{id}");
        }

        let snap = ParameterSnapshot::read(&restored);
        assert_eq!(snap.mode, Mode::Hybrid);
        assert_eq!(snap.monitor_mode, MonitorMode::Mid);
        assert!(snap.band_listen_enabled);
    }

    #[test]
    fn test_snapshot_capture_matches() {
        let mut snap = ParameterSnapshot::default();
        snap.sat_mode = SatMode::Foldback;
        snap.width = 1.7;
        let set = ParameterSet::from_snapshot(&snap);
        assert_eq!(ParameterSnapshot::read(&set), snap);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(ParameterSet::from_json("{ not json").is_err());
        assert!(ParameterSet::from_json("{\"drive\": \"loud\"}").is_err());
    }
}
