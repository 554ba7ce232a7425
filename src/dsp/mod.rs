//! DSP pipeline
//!
//! The settings normalizer, the five lo-fi stages and the orchestrator that
//! chains them. Every stage implements the `Stage` trait so the pipeline can
//! hold them as one ordered collection.

pub mod bitcrush;
pub mod denoise;
pub mod echo;
pub mod lowpass;
pub mod pipeline;
pub mod settings;
pub mod stage;
pub mod time_stretch;

pub use bitcrush::{quantize_to_bit_depth, BitCrush};
pub use denoise::Denoise;
pub use echo::Echo;
pub use lowpass::{BiquadCoeffs, Lowpass};
pub use pipeline::{process, LofiPipeline};
pub use settings::{EchoParams, EchoTap, LofiSettings, NormalizedParameters, Preset, ResamplePlan};
pub use stage::{Stage, StagePosition};
pub use time_stretch::TimeStretch;
