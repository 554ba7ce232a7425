//! Lofi - Lo-fi Audio Conversion Engine
//!
//! Turns a recording into a "lo-fi" version by running it through a fixed
//! chain of DSP stages controlled by five percentage settings.
//!
//! # Architecture
//!
//! - `dsp`: settings normalizer, the five stages and the pipeline
//!   (Time-Stretch → Lowpass → Echo → Denoise → Bit-Reduction)
//! - `engine`: audio buffer, WAV I/O and analysis
//! - `service`: worker pool, audio source/sink and the request façade
//! - `config`: JSON configuration with environment overrides
//! - `cli`: the `lofi-cli` command implementations
//!
//! # Example
//! ```
//! use lofi::dsp::{process, LofiSettings};
//! use lofi::engine::generate_test_tone;
//!
//! let tone = generate_test_tone(440.0, 0.5, 44100);
//! let out = process(tone.clone(), &LofiSettings::identity()).unwrap();
//! assert_eq!(out, tone);
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod service;

pub use config::LofiConfig;
pub use dsp::{LofiPipeline, LofiSettings, NormalizedParameters, Preset};
pub use engine::AudioBuffer;
pub use error::{LofiError, Result};
pub use service::{LofiService, WorkerPool};
