//! CLI Module
//!
//! Command-line interface for the lofi engine.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::dsp::{LofiSettings, Preset};

/// Lofi - turn any recording into a lo-fi track
#[derive(Parser, Debug)]
#[command(name = "lofi-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Preset plus per-field overrides
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
    /// Starting preset (chill, study, sleep, deep)
    #[arg(short, long, default_value = "chill")]
    pub preset: Preset,

    /// Tempo in percent (60-100)
    #[arg(long)]
    pub tempo: Option<i32>,

    /// Reverb in percent (0-100)
    #[arg(long)]
    pub reverb: Option<i32>,

    /// Filter in percent (0-100)
    #[arg(long)]
    pub filter: Option<i32>,

    /// Noise reduction in percent (0-100)
    #[arg(long)]
    pub noise: Option<i32>,

    /// Bitcrusher in percent (0-100)
    #[arg(long)]
    pub bitcrusher: Option<i32>,
}

impl SettingsArgs {
    /// Preset settings with any explicit values applied on top
    pub fn to_settings(&self) -> LofiSettings {
        let base = self.preset.settings();
        LofiSettings {
            tempo: self.tempo.unwrap_or(base.tempo),
            reverb: self.reverb.unwrap_or(base.reverb),
            filter: self.filter.unwrap_or(base.filter),
            noise: self.noise.unwrap_or(base.noise),
            bitcrusher: self.bitcrusher.unwrap_or(base.bitcrusher),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a WAV file directly
    #[command(name = "process")]
    Process {
        /// Input WAV file
        input: PathBuf,

        /// Output WAV file
        output: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 16)]
        bit_depth: u16,
    },

    /// Store source audio as an upload and print the handle
    #[command(name = "extract")]
    Extract {
        /// Video link or path to a WAV file
        locator: String,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Process a stored upload through the worker pool
    #[command(name = "render")]
    Render {
        /// Handle returned by extract, e.g. /uploads/<uuid>.wav
        audio_url: String,

        #[command(flatten)]
        settings: SettingsArgs,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the normalized DSP parameters for some settings
    #[command(name = "params")]
    Params {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// List the presets
    #[command(name = "presets")]
    Presets,

    /// Print an analysis of a WAV file
    #[command(name = "analyze")]
    Analyze {
        /// WAV file to analyze
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "lofi-cli", "process", "in.wav", "out.wav", "--preset", "sleep", "--tempo", "90",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Process {
                settings,
                bit_depth,
                ..
            }) => {
                assert_eq!(bit_depth, 16);
                let s = settings.to_settings();
                assert_eq!(s.tempo, 90);
                assert_eq!(s.reverb, Preset::Sleep.settings().reverb);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_preset_rejected() {
        assert!(Cli::try_parse_from(["lofi-cli", "params", "--preset", "loud"]).is_err());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["lofi-cli", "presets", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
