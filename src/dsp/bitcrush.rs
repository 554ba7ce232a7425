//! Bit-Reduction stage
//!
//! Band-limits the audio to telephone quality by resampling down to 8 kHz
//! and back up to the buffer's own rate with a sinc resampler. Each leg runs
//! as one whole-buffer chunk, which rubato centres on the first input frame,
//! so the result is time-aligned with the input and exactly as long.
//!
//! `quantize_to_bit_depth` is a separate word-length reduction that the
//! pipeline does not apply.

use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::dsp::settings::NormalizedParameters;
use crate::dsp::stage::{Stage, StagePosition};
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

/// Sinc kernel length of the resampler
const SINC_LEN: usize = 256;

/// Sample-rate round trip; the intermediate rate comes from the resample plan
#[derive(Debug, Clone, Copy, Default)]
pub struct BitCrush;

impl BitCrush {
    /// Round-trip `buffer` through `intermediate_rate`
    ///
    /// A buffer already at the intermediate rate is returned as is.
    pub fn crush(&self, buffer: AudioBuffer, intermediate_rate: u32) -> Result<AudioBuffer> {
        if intermediate_rate == 0 {
            return Err(LofiError::stage(self.name(), "intermediate rate is zero"));
        }

        let original_rate = buffer.sample_rate;
        if original_rate == intermediate_rate {
            return Ok(buffer);
        }

        let original_len = buffer.len();
        let down = resample(&buffer.samples, original_rate, intermediate_rate)
            .map_err(|reason| LofiError::stage(self.name(), reason))?;
        drop(buffer);

        let mut up = resample(&down, intermediate_rate, original_rate)
            .map_err(|reason| LofiError::stage(self.name(), reason))?;

        for channel in &mut up {
            channel.resize(original_len, 0.0);
        }

        debug!(
            "bit_reduction: {} Hz -> {} Hz -> {} Hz, {} samples",
            original_rate, intermediate_rate, original_rate, original_len
        );

        Ok(AudioBuffer {
            samples: up,
            sample_rate: original_rate,
        })
    }
}

impl Stage for BitCrush {
    fn position(&self) -> StagePosition {
        StagePosition::BitReduction
    }

    fn is_active(&self, params: &NormalizedParameters) -> bool {
        params.resample.is_some()
    }

    fn apply(&self, buffer: AudioBuffer, params: &NormalizedParameters) -> Result<AudioBuffer> {
        match params.resample {
            Some(plan) => self.crush(buffer, plan.intermediate_rate),
            None => Ok(buffer),
        }
    }
}

/// Resample whole channels from `from` Hz to `to` Hz
///
/// Output has `round(len * to / from)` frames. Output frame `k` sits at
/// input time `k / ratio`; a single full-length chunk carries no extra delay,
/// so nothing is skipped.
fn resample(channels: &[Vec<f32>], from: u32, to: u32) -> std::result::Result<Vec<Vec<f32>>, String> {
    let ratio = to as f64 / from as f64;
    let input_len = channels.first().map(|c| c.len()).unwrap_or(0);
    let target_len = (input_len as f64 * ratio).round() as usize;

    // Trailing zeros give the kernel right-hand context for the last frames
    let chunk_len = input_len + SINC_LEN;
    let padded: Vec<Vec<f32>> = channels
        .iter()
        .map(|c| {
            let mut p = Vec::with_capacity(chunk_len);
            p.extend_from_slice(c);
            p.resize(chunk_len, 0.0);
            p
        })
        .collect();

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_len, channels.len())
        .map_err(|e| format!("cannot build {} -> {} Hz resampler: {}", from, to, e))?;

    let output = resampler
        .process(&padded, None)
        .map_err(|e| format!("resampling {} -> {} Hz failed: {}", from, to, e))?;

    Ok(output
        .into_iter()
        .map(|channel| {
            let mut aligned: Vec<f32> = channel.into_iter().take(target_len).collect();
            aligned.resize(target_len, 0.0);
            aligned
        })
        .collect())
}

/// Reduce every sample to `bits` of resolution
///
/// # Errors
/// `StageFailure` when `bits` is outside 1..=24.
pub fn quantize_to_bit_depth(buffer: &mut AudioBuffer, bits: u32) -> Result<()> {
    if !(1..=24).contains(&bits) {
        return Err(LofiError::stage(
            StagePosition::BitReduction.name(),
            format!("bit depth {} outside 1-24", bits),
        ));
    }

    let steps = (1_u32 << (bits - 1)) as f32;
    for channel in &mut buffer.samples {
        for sample in channel.iter_mut() {
            *sample = ((*sample * steps).round() / steps).clamp(-1.0, 1.0);
        }
    }
    Ok(())
}
