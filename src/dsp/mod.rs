pub mod auto_gain;
pub mod limiter;
pub mod metering;
pub mod mix;
pub mod monitor;
pub mod oversampling;
pub mod ramp;
pub mod saturation;
pub mod spectrum;
pub mod stereo;
pub mod svf;
pub mod utils;

pub use auto_gain::AutoGain;
pub use limiter::SafetyLimiter;
pub use metering::MeteringEngine;
pub use oversampling::Oversampler;
pub use ramp::BlockRamp;
pub use spectrum::SpectrumAnalyzer;
pub use svf::StateVariableFilter;
