//! Audio Engine Module
//!
//! Core audio types shared by the pipeline and the service layer:
//! - Audio buffer management
//! - WAV file I/O
//! - Objective audio analysis

pub mod buffer;
pub mod io;
pub mod verification;

pub use buffer::AudioBuffer;
pub use io::{
    encode_wav, export_audio, generate_stereo_test_tone, generate_test_tone, import_audio,
    ExportFormat,
};
pub use verification::AudioAnalysis;
