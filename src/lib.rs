pub mod debug;
pub mod dsp;
pub mod meters;
pub mod params;
pub mod processor;

use crate::meters::Meters;
use crate::params::*;
use crate::processor::NeonProcessor;
use nih_plug::prelude::*;
use std::sync::Arc;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------
#[derive(Params)]
pub struct NeonParams {
    #[id = "mode"]
    pub mode: EnumParam<Mode>,

    // -------------------------------------------------------------------------
    // TONE FILTER
    // -------------------------------------------------------------------------
    #[id = "filterType"]
    pub filter_type: EnumParam<FilterType>,

    #[id = "cutoff"]
    pub cutoff: FloatParam,

    #[id = "resonance"]
    pub resonance: FloatParam,

    // -------------------------------------------------------------------------
    // DISTORTION
    // -------------------------------------------------------------------------
    #[id = "drive"]
    pub drive: FloatParam,

    #[id = "satMode"]
    pub sat_mode: EnumParam<SatMode>,

    #[id = "oversampling"]
    pub oversampling: EnumParam<Oversampling>,

    #[id = "mix"]
    pub mix: FloatParam,

    #[id = "autoGainEnabled"]
    pub auto_gain_enabled: BoolParam,

    // -------------------------------------------------------------------------
    // OUTPUT
    // -------------------------------------------------------------------------
    #[id = "width"]
    pub width: FloatParam,

    #[id = "outputTrim"]
    pub output_trim: FloatParam,

    #[id = "limiterEnabled"]
    pub limiter_enabled: BoolParam,

    #[id = "bandListenEnabled"]
    pub band_listen_enabled: BoolParam,

    #[id = "monitorMode"]
    pub monitor_mode: EnumParam<MonitorMode>,

    // -------------------------------------------------------------------------
    // VISUALISATION
    // -------------------------------------------------------------------------
    /// Linear gain applied to what the meters see, not to the audio.
    #[id = "sensitivity"]
    pub sensitivity: FloatParam,

    #[id = "smoothing"]
    pub smoothing: FloatParam,
}

fn format_percent(v: f32) -> String {
    format!("{:.0}%", v * 100.0)
}

fn format_db(v: f32) -> String {
    format!("{:.1} dB", v)
}

fn format_hz(v: f32) -> String {
    if v >= 1000.0 {
        format!("{:.2} kHz", v / 1000.0)
    } else {
        format!("{:.0} Hz", v)
    }
}

fn format_ratio(v: f32) -> String {
    format!("{:.2}", v)
}

impl Default for NeonParams {
    fn default() -> Self {
        Self {
            mode: EnumParam::new("Mode", Mode::default()),

            filter_type: EnumParam::new("Filter Type", FilterType::default()),

            cutoff: FloatParam::new(
                "Cutoff",
                DEFAULT_CUTOFF_HZ,
                FloatRange::Skewed {
                    min: dsp::svf::MIN_CUTOFF_HZ,
                    max: dsp::svf::MAX_CUTOFF_HZ,
                    factor: 0.4,
                },
            )
            .with_value_to_string(Arc::new(format_hz)),

            resonance: FloatParam::new(
                "Resonance",
                DEFAULT_RESONANCE,
                FloatRange::Skewed {
                    min: dsp::svf::MIN_RESONANCE,
                    max: dsp::svf::MAX_RESONANCE,
                    factor: 0.7,
                },
            )
            .with_value_to_string(Arc::new(format_ratio)),

            drive: FloatParam::new(
                "Drive",
                DEFAULT_DRIVE,
                FloatRange::Skewed {
                    min: DRIVE_RANGE.0,
                    max: DRIVE_RANGE.1,
                    factor: 0.6,
                },
            )
            .with_value_to_string(Arc::new(format_ratio)),

            sat_mode: EnumParam::new("Saturation Mode", SatMode::default()),

            oversampling: EnumParam::new("Oversampling", Oversampling::default()),

            mix: FloatParam::new(
                "Mix",
                DEFAULT_MIX,
                FloatRange::Linear {
                    min: MIX_RANGE.0,
                    max: MIX_RANGE.1,
                },
            )
            .with_value_to_string(Arc::new(format_percent)),

            auto_gain_enabled: BoolParam::new("Auto Gain", true),

            width: FloatParam::new(
                "Width",
                DEFAULT_WIDTH,
                FloatRange::Linear {
                    min: WIDTH_RANGE.0,
                    max: WIDTH_RANGE.1,
                },
            )
            .with_value_to_string(Arc::new(format_percent)),

            output_trim: FloatParam::new(
                "Output Trim",
                DEFAULT_OUTPUT_TRIM_DB,
                FloatRange::Linear {
                    min: OUTPUT_TRIM_RANGE_DB.0,
                    max: OUTPUT_TRIM_RANGE_DB.1,
                },
            )
            .with_step_size(0.1)
            .with_value_to_string(Arc::new(format_db)),

            limiter_enabled: BoolParam::new("Safety Limiter", true),

            band_listen_enabled: BoolParam::new("Band Listen", false),

            monitor_mode: EnumParam::new("Monitor", MonitorMode::default()),

            sensitivity: FloatParam::new(
                "Sensitivity",
                DEFAULT_SENSITIVITY,
                FloatRange::Skewed {
                    min: SENSITIVITY_RANGE.0,
                    max: SENSITIVITY_RANGE.1,
                    factor: 0.35,
                },
            )
            .with_value_to_string(Arc::new(format_ratio)),

            smoothing: FloatParam::new(
                "Smoothing",
                DEFAULT_SMOOTHING,
                FloatRange::Skewed {
                    min: SMOOTHING_RANGE.0,
                    max: SMOOTHING_RANGE.1,
                    factor: 0.5,
                },
            )
            .with_value_to_string(Arc::new(format_percent)),
        }
    }
}

impl ParamSource for NeonParams {
    fn raw_value(&self, id: &str) -> Option<f32> {
        let flag = |p: &BoolParam| if p.value() { 1.0 } else { 0.0 };
        let v = match id {
            ID_MODE => self.mode.value().index() as f32,
            ID_FILTER_TYPE => self.filter_type.value().index() as f32,
            ID_CUTOFF => self.cutoff.value(),
            ID_RESONANCE => self.resonance.value(),
            ID_DRIVE => self.drive.value(),
            ID_SAT_MODE => self.sat_mode.value().index() as f32,
            ID_WIDTH => self.width.value(),
            ID_MIX => self.mix.value(),
            ID_OUTPUT_TRIM => self.output_trim.value(),
            ID_OVERSAMPLING => self.oversampling.value().index() as f32,
            ID_SENSITIVITY => self.sensitivity.value(),
            ID_SMOOTHING => self.smoothing.value(),
            ID_AUTO_GAIN => flag(&self.auto_gain_enabled),
            ID_LIMITER => flag(&self.limiter_enabled),
            ID_BAND_LISTEN => flag(&self.band_listen_enabled),
            ID_MONITOR_MODE => self.monitor_mode.value().index() as f32,
            _ => return None,
        };
        Some(v)
    }
}

// -----------------------------------------------------------------------------
// PLUGIN STRUCT
// -----------------------------------------------------------------------------
pub struct NeonScopePlugin {
    params: Arc<NeonParams>,
    meters: Arc<Meters>,
    processor: NeonProcessor,
    input_channels: usize,
}

impl Default for NeonScopePlugin {
    fn default() -> Self {
        let meters = Arc::new(Meters::new());
        Self {
            params: Arc::new(NeonParams::default()),
            processor: NeonProcessor::new(meters.clone()),
            meters,
            input_channels: 2,
        }
    }
}

impl NeonScopePlugin {
    /// Published meter and spectrum state, for an editor to poll.
    pub fn meters(&self) -> Arc<Meters> {
        self.meters.clone()
    }
}

impl Plugin for NeonScopePlugin {
    const NAME: &'static str = "NeonScope";
    const VENDOR: &'static str = "NeonScope Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            ..AudioIOLayout::const_default()
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            ..AudioIOLayout::const_default()
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        debug::init();

        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let inputs = audio_io_layout
                .main_input_channels
                .map(NonZeroU32::get)
                .unwrap_or(0) as usize;
            let outputs = audio_io_layout
                .main_output_channels
                .map(NonZeroU32::get)
                .unwrap_or(0) as usize;

            self.input_channels = inputs;
            self.processor.prepare(
                buffer_config.sample_rate,
                buffer_config.max_buffer_size as usize,
                inputs.max(outputs),
            );

            // Flush any initialization log messages to file
            debug::flush();
            true
        }))
        .unwrap_or(false)
    }

    fn reset(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.processor.reset();
        }))
        .unwrap_or(());
    }

    fn deactivate(&mut self) {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.processor.release();
            debug::flush();
        }))
        .unwrap_or(());
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let num_samples = buffer.samples();
            self.processor.process(
                buffer.as_slice(),
                self.input_channels,
                num_samples,
                self.params.as_ref(),
            );
        }))
        .unwrap_or(());

        ProcessStatus::Normal
    }
}

impl ClapPlugin for NeonScopePlugin {
    const CLAP_ID: &'static str = "audio.neonscope.neonscope";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Tone filter, saturation and stereo metering with a live spectrum");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Distortion,
        ClapFeature::Filter,
        ClapFeature::Analyzer,
        ClapFeature::Stereo,
        ClapFeature::Mono,
    ];
}

impl Vst3Plugin for NeonScopePlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"NeonScopeCore001";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Distortion,
        Vst3SubCategory::Analyzer,
    ];
}

nih_export_clap!(NeonScopePlugin);
nih_export_vst3!(NeonScopePlugin);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_params_match_snapshot_defaults() {
        let params = NeonParams::default();
        let snapshot = ParameterSnapshot::read(&params);
        assert_eq!(snapshot, ParameterSnapshot::default());
    }

    #[test]
    fn test_every_id_is_bound() {
        let params = NeonParams::default();
        for id in ALL_IDS {
            assert!(params.raw_value(id).is_some(), "{id}");
        }
        assert!(params.raw_value("nope").is_none());
    }

    #[test]
    fn test_param_map_uses_wire_ids() {
        let params = NeonParams::default();
        let ids: Vec<String> = params.param_map().into_iter().map(|(id, _, _)| id).collect();
        for id in ALL_IDS {
            assert!(ids.iter().any(|p| p == id), "{id}");
        }
        assert_eq!(ids.len(), ALL_IDS.len());
    }
}
