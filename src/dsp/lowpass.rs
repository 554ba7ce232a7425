//! Lowpass filter stage
//!
//! Second-order Butterworth low-pass built from the RBJ cookbook biquad.
//! Runs in f64 with one filter state per channel.

use std::f64::consts::PI;

use log::debug;

use crate::dsp::settings::NormalizedParameters;
use crate::dsp::stage::{Stage, StagePosition};
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

/// Butterworth quality factor (1/√2)
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Lowest cutoff the stage will use
pub const MIN_CUTOFF_HZ: f64 = 20.0;

/// Highest cutoff as a fraction of Nyquist
pub const MAX_CUTOFF_NYQUIST_RATIO: f64 = 0.98;

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Cookbook low-pass design
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `cutoff_hz` - -3 dB point in Hz (not clamped here)
    /// * `q` - Quality factor
    pub fn lowpass(sample_rate: f64, cutoff_hz: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let b0 = (1.0 - cos_w0) / 2.0;
        let b1 = 1.0 - cos_w0;
        let b2 = (1.0 - cos_w0) / 2.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Finite coefficients with both poles strictly inside the unit circle
    pub fn is_stable(&self) -> bool {
        let finite = [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite());
        finite && self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }

    /// Magnitude response at `frequency` in dB
    pub fn magnitude_db(&self, sample_rate: f64, frequency: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num / den).log10()
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Direct Form I
    #[inline]
    fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// Keep the cutoff positive and below Nyquist
pub fn clamp_cutoff(cutoff_hz: f64, sample_rate: u32) -> f64 {
    let upper = MAX_CUTOFF_NYQUIST_RATIO * sample_rate as f64 / 2.0;
    if upper <= MIN_CUTOFF_HZ {
        upper
    } else {
        cutoff_hz.clamp(MIN_CUTOFF_HZ, upper)
    }
}

/// Butterworth lowpass stage
#[derive(Debug, Clone)]
pub struct Lowpass {
    q: f64,
}

impl Default for Lowpass {
    fn default() -> Self {
        Self { q: BUTTERWORTH_Q }
    }
}

impl Lowpass {
    pub fn with_q(q: f64) -> Self {
        Self { q }
    }

    /// Filter every channel of `buffer` at `cutoff_hz`
    ///
    /// # Errors
    /// `StageFailure` if the designed filter is unstable.
    pub fn filter(&self, mut buffer: AudioBuffer, cutoff_hz: f32) -> Result<AudioBuffer> {
        let cutoff = clamp_cutoff(cutoff_hz as f64, buffer.sample_rate);
        let coeffs = BiquadCoeffs::lowpass(buffer.sample_rate as f64, cutoff, self.q);

        if !coeffs.is_stable() {
            return Err(LofiError::stage(
                self.name(),
                format!(
                    "unstable coefficients for cutoff {:.1} Hz, q {:.3}: {:?}",
                    cutoff, self.q, coeffs
                ),
            ));
        }

        debug!(
            "lowpass: requested {:.1} Hz, using {:.1} Hz at {} Hz",
            cutoff_hz, cutoff, buffer.sample_rate
        );

        for channel in &mut buffer.samples {
            let mut state = BiquadState::default();
            for sample in channel.iter_mut() {
                *sample = state.process(*sample as f64, &coeffs) as f32;
            }
        }

        Ok(buffer)
    }
}

impl Stage for Lowpass {
    fn position(&self) -> StagePosition {
        StagePosition::Lowpass
    }

    fn is_active(&self, params: &NormalizedParameters) -> bool {
        params.cutoff_hz.is_some()
    }

    fn apply(&self, buffer: AudioBuffer, params: &NormalizedParameters) -> Result<AudioBuffer> {
        match params.cutoff_hz {
            Some(cutoff) => self.filter(buffer, cutoff),
            None => Ok(buffer),
        }
    }
}
