//! Echo/Reverb stage
//!
//! Fixed two-tap echo: `out[n] = out_gain * (in_gain * x[n] + Σ decay_k * x[n - d_k])`.
//! The output grows by the longest tap delay so the tail survives, and is
//! peak-normalized when the mix exceeds full scale.

use log::debug;

use crate::dsp::settings::{EchoParams, NormalizedParameters};
use crate::dsp::stage::{Stage, StagePosition};
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

/// Delay in samples for a tap at `delay_ms`
pub fn delay_samples(delay_ms: f32, sample_rate: u32) -> usize {
    (delay_ms as f64 * sample_rate as f64 / 1000.0).round() as usize
}

#[derive(Debug, Clone, Default)]
pub struct Echo;

impl Echo {
    /// Mix the echo taps into every channel
    ///
    /// # Returns
    /// A buffer `max_delay` samples longer than the input.
    pub fn render(&self, buffer: AudioBuffer, echo: &EchoParams) -> Result<AudioBuffer> {
        if echo.taps.iter().any(|t| !t.delay_ms.is_finite() || t.delay_ms < 0.0) {
            return Err(LofiError::stage(
                self.name(),
                format!("invalid tap delays: {:?}", echo.taps),
            ));
        }

        let sample_rate = buffer.sample_rate;
        let input_len = buffer.len();
        let taps: Vec<(usize, f32)> = echo
            .taps
            .iter()
            .map(|t| (delay_samples(t.delay_ms, sample_rate), t.decay))
            .collect();
        let tail = taps.iter().map(|&(d, _)| d).max().unwrap_or(0);
        let out_len = input_len + tail;

        let mut samples = Vec::with_capacity(buffer.channels());
        for input in &buffer.samples {
            let mut output = vec![0.0_f32; out_len];
            for (n, &x) in input.iter().enumerate() {
                output[n] += echo.in_gain * x;
                for &(delay, decay) in &taps {
                    output[n + delay] += decay * x;
                }
            }
            for s in output.iter_mut() {
                *s *= echo.out_gain;
            }
            samples.push(output);
        }

        let mut output = AudioBuffer {
            samples,
            sample_rate,
        };

        let peak = output.peak();
        if peak > 1.0 {
            debug!("echo: normalizing peak {:.3}", peak);
            output.scale(1.0 / peak);
        }

        debug!(
            "echo: {} taps, {} -> {} samples",
            taps.len(),
            input_len,
            out_len
        );

        Ok(output)
    }
}

impl Stage for Echo {
    fn position(&self) -> StagePosition {
        StagePosition::Echo
    }

    fn is_active(&self, params: &NormalizedParameters) -> bool {
        params.echo.is_some()
    }

    fn apply(&self, buffer: AudioBuffer, params: &NormalizedParameters) -> Result<AudioBuffer> {
        match &params.echo {
            Some(echo) => self.render(buffer, echo),
            None => Ok(buffer),
        }
    }
}
