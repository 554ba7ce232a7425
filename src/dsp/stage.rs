//! Stage capability
//!
//! Every DSP stage is a pure transformation over an owned buffer. The
//! pipeline holds stages as trait objects and asks each one whether it is
//! active for the current parameters.

use crate::dsp::settings::NormalizedParameters;
use crate::engine::AudioBuffer;
use crate::error::Result;

/// Fixed position of each stage in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StagePosition {
    TimeStretch = 0,
    Lowpass = 1,
    Echo = 2,
    Denoise = 3,
    BitReduction = 4,
}

impl StagePosition {
    pub fn name(&self) -> &'static str {
        match self {
            StagePosition::TimeStretch => "time_stretch",
            StagePosition::Lowpass => "lowpass",
            StagePosition::Echo => "echo",
            StagePosition::Denoise => "denoise",
            StagePosition::BitReduction => "bit_reduction",
        }
    }
}

/// A single DSP stage
pub trait Stage: Send + Sync {
    /// Where the stage sits in the chain
    fn position(&self) -> StagePosition;

    /// Stage identifier used in logs and `StageFailure` errors
    fn name(&self) -> &'static str {
        self.position().name()
    }

    /// Gate: whether the stage runs for these parameters
    fn is_active(&self, params: &NormalizedParameters) -> bool;

    /// Transform the buffer
    ///
    /// Only called when `is_active` returned true. Implementations consume
    /// the input and return a new (or the same, modified) buffer.
    fn apply(&self, buffer: AudioBuffer, params: &NormalizedParameters) -> Result<AudioBuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_ordered() {
        let mut positions = vec![
            StagePosition::BitReduction,
            StagePosition::Echo,
            StagePosition::TimeStretch,
            StagePosition::Denoise,
            StagePosition::Lowpass,
        ];
        positions.sort();
        let names: Vec<_> = positions.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            ["time_stretch", "lowpass", "echo", "denoise", "bit_reduction"]
        );
    }
}
