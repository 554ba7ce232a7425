//! Settings normalization
//!
//! Maps the five percentage controls to concrete DSP parameters. The
//! mapping is pure and infallible: out-of-range values are clamped, never
//! rejected. `LofiSettings::validate` exists for callers that want to
//! reject bad input up front (the request façade does).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LofiError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Valid tempo range in percent
pub const TEMPO_RANGE: (i32, i32) = (60, 100);

/// Valid range for reverb, filter, noise and bitcrusher
pub const PERCENT_RANGE: (i32, i32) = (0, 100);

/// Cutoff at filter = 0
pub const MAX_CUTOFF_HZ: f32 = 20000.0;

/// Cutoff drop per filter percent
pub const CUTOFF_STEP_HZ: f32 = 150.0;

/// Fixed denoise floor
pub const NOISE_FLOOR_DB: f32 = -20.0;

/// Intermediate rate of the bit-reduction round trip
pub const CRUSH_SAMPLE_RATE: u32 = 8000;

pub const ECHO_IN_GAIN: f32 = 0.8;
pub const ECHO_OUT_GAIN: f32 = 0.9;
pub const ECHO_TAPS: [EchoTap; 2] = [
    EchoTap {
        delay_ms: 1000.0,
        decay: 0.3,
    },
    EchoTap {
        delay_ms: 1800.0,
        decay: 0.25,
    },
];

// ============================================================================
// Settings
// ============================================================================

/// The five user-facing intensity controls, in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LofiSettings {
    /// Playback speed, 60-100
    pub tempo: i32,
    /// Echo on/off, 0-100
    pub reverb: i32,
    /// Lowpass amount, 0-100
    pub filter: i32,
    /// Denoise on/off, 0-100
    pub noise: i32,
    /// Bit-reduction on/off, 0-100
    pub bitcrusher: i32,
}

impl Default for LofiSettings {
    fn default() -> Self {
        Preset::Chill.settings()
    }
}

impl LofiSettings {
    /// Settings that leave every stage switched off
    pub fn identity() -> Self {
        Self {
            tempo: 100,
            reverb: 0,
            filter: 0,
            noise: 0,
            bitcrusher: 0,
        }
    }

    /// Reject values outside their documented ranges
    ///
    /// # Errors
    /// `InvalidSettings` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        check_range("tempo", self.tempo, TEMPO_RANGE)?;
        check_range("reverb", self.reverb, PERCENT_RANGE)?;
        check_range("filter", self.filter, PERCENT_RANGE)?;
        check_range("noise", self.noise, PERCENT_RANGE)?;
        check_range("bitcrusher", self.bitcrusher, PERCENT_RANGE)?;
        Ok(())
    }

    /// Copy with every field clamped to its range
    pub fn clamped(&self) -> Self {
        Self {
            tempo: self.tempo.clamp(TEMPO_RANGE.0, TEMPO_RANGE.1),
            reverb: self.reverb.clamp(PERCENT_RANGE.0, PERCENT_RANGE.1),
            filter: self.filter.clamp(PERCENT_RANGE.0, PERCENT_RANGE.1),
            noise: self.noise.clamp(PERCENT_RANGE.0, PERCENT_RANGE.1),
            bitcrusher: self.bitcrusher.clamp(PERCENT_RANGE.0, PERCENT_RANGE.1),
        }
    }
}

impl fmt::Display for LofiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tempo={} reverb={} filter={} noise={} bitcrusher={}",
            self.tempo, self.reverb, self.filter, self.noise, self.bitcrusher
        )
    }
}

fn check_range(field: &str, value: i32, (min, max): (i32, i32)) -> Result<()> {
    if value < min || value > max {
        return Err(LofiError::InvalidSettings {
            field: field.to_string(),
            value: value as i64,
            expected: format!("{}-{}", min, max),
        });
    }
    Ok(())
}

// ============================================================================
// Presets
// ============================================================================

/// Named starting points offered to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Chill,
    Study,
    Sleep,
    Deep,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Chill, Preset::Study, Preset::Sleep, Preset::Deep];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Chill => "chill",
            Preset::Study => "study",
            Preset::Sleep => "sleep",
            Preset::Deep => "deep",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Chill => "Chill vibes",
            Preset::Study => "Study session",
            Preset::Sleep => "Sleep mode",
            Preset::Deep => "Deep focus",
        }
    }

    pub fn settings(&self) -> LofiSettings {
        let (tempo, reverb, filter, noise, bitcrusher) = match self {
            Preset::Chill => (85, 30, 40, 15, 10),
            Preset::Study => (80, 40, 50, 20, 15),
            Preset::Sleep => (70, 60, 70, 10, 5),
            Preset::Deep => (75, 50, 60, 25, 20),
        };
        LofiSettings {
            tempo,
            reverb,
            filter,
            noise,
            bitcrusher,
        }
    }
}

impl FromStr for Preset {
    type Err = LofiError;

    fn from_str(s: &str) -> Result<Self> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LofiError::Config {
                reason: format!(
                    "unknown preset '{}' (expected one of chill, study, sleep, deep)",
                    s
                ),
            })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Normalized parameters
// ============================================================================

/// One delayed copy mixed into the echo output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoTap {
    pub delay_ms: f32,
    pub decay: f32,
}

/// Fixed echo shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoParams {
    pub in_gain: f32,
    pub out_gain: f32,
    pub taps: Vec<EchoTap>,
}

impl Default for EchoParams {
    fn default() -> Self {
        Self {
            in_gain: ECHO_IN_GAIN,
            out_gain: ECHO_OUT_GAIN,
            taps: ECHO_TAPS.to_vec(),
        }
    }
}

impl EchoParams {
    /// Longest tap delay in milliseconds
    pub fn max_delay_ms(&self) -> f32 {
        self.taps.iter().map(|t| t.delay_ms).fold(0.0, f32::max)
    }
}

/// Down-then-up resample used for bit reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResamplePlan {
    pub intermediate_rate: u32,
}

/// Stage parameters derived once per invocation
///
/// `None` on an optional field means the corresponding stage is gated off.
/// `reverb_amount`, `noise_level` and `bit_depth` are derived for
/// intensity-scaled stages but no stage reads them yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedParameters {
    /// The clamped settings these parameters came from
    pub settings: LofiSettings,
    pub tempo_factor: f32,
    pub cutoff_hz: Option<f32>,
    pub echo: Option<EchoParams>,
    pub noise_floor_db: Option<f32>,
    pub resample: Option<ResamplePlan>,
    pub reverb_amount: f32,
    pub noise_level: f32,
    pub bit_depth: u32,
}

impl NormalizedParameters {
    /// Derive stage parameters from user settings
    pub fn from_settings(settings: &LofiSettings) -> Self {
        let s = settings.clamped();

        Self {
            settings: s,
            tempo_factor: s.tempo as f32 / 100.0,
            cutoff_hz: (s.filter > 0).then(|| MAX_CUTOFF_HZ - s.filter as f32 * CUTOFF_STEP_HZ),
            echo: (s.reverb > 0).then(EchoParams::default),
            noise_floor_db: (s.noise > 0).then_some(NOISE_FLOOR_DB),
            resample: (s.bitcrusher > 0).then_some(ResamplePlan {
                intermediate_rate: CRUSH_SAMPLE_RATE,
            }),
            reverb_amount: s.reverb as f32 / 100.0,
            noise_level: s.noise as f32 / 500.0,
            bit_depth: 16 - (s.bitcrusher as u32 / 20) * 2,
        }
    }

    /// Whether time-stretching is needed
    pub fn stretches(&self) -> bool {
        self.tempo_factor < 1.0
    }
}

impl From<&LofiSettings> for NormalizedParameters {
    fn from(settings: &LofiSettings) -> Self {
        Self::from_settings(settings)
    }
}
