//! Denoise stage
//!
//! STFT spectral gate. The threshold sits a fixed number of dB below the
//! strongest bin seen anywhere in the buffer; quieter bins are pulled down
//! with a squared soft knee, floored, and released smoothly across frames.
//! Bins at or above the threshold pass untouched.

use std::sync::Arc;

use log::debug;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::dsp::settings::NormalizedParameters;
use crate::dsp::stage::{Stage, StagePosition};
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

pub const DEFAULT_FFT_SIZE: usize = 2048;

/// 75% overlap
pub const DEFAULT_HOP: usize = DEFAULT_FFT_SIZE / 4;

/// Deepest attenuation applied to any bin
pub const DEFAULT_GAIN_FLOOR_DB: f32 = -40.0;

/// Release coefficient of the per-bin gain smoother
pub const DEFAULT_RELEASE: f32 = 0.5;

/// Spectral gate
#[derive(Debug, Clone)]
pub struct Denoise {
    fft_size: usize,
    hop: usize,
    gain_floor_db: f32,
    release: f32,
}

impl Default for Denoise {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            hop: DEFAULT_HOP,
            gain_floor_db: DEFAULT_GAIN_FLOOR_DB,
            release: DEFAULT_RELEASE,
        }
    }
}

/// Forward/inverse transforms plus the analysis window, shared by both passes
struct Stft {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    frame: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Stft {
    fn new(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        let window = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
            .collect();

        Self {
            forward,
            inverse,
            window,
            frame: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Windowed spectrum of `channel[start..start + size]`, zero outside
    fn analyze(&mut self, channel: &[f32], start: i64) {
        for (i, (slot, &w)) in self.frame.iter_mut().zip(self.window.iter()).enumerate() {
            let t = start + i as i64;
            let x = if t >= 0 && (t as usize) < channel.len() {
                channel[t as usize]
            } else {
                0.0
            };
            *slot = Complex::new(x * w, 0.0);
        }
        self.forward.process_with_scratch(&mut self.frame, &mut self.scratch);
    }

    fn synthesize(&mut self) {
        self.inverse.process_with_scratch(&mut self.frame, &mut self.scratch);
    }
}

impl Denoise {
    pub fn new(fft_size: usize, hop: usize) -> Self {
        Self {
            fft_size,
            hop,
            ..Self::default()
        }
    }

    /// Frame start positions covering every sample with the full overlap
    fn frame_starts(&self, len: usize) -> impl Iterator<Item = i64> {
        let first = -((self.fft_size - self.hop) as i64);
        let hop = self.hop as i64;
        let len = len as i64;
        (0..)
            .map(move |k| first + k * hop)
            .take_while(move |&start| start < len)
    }

    /// Gate every channel of `buffer`
    ///
    /// # Arguments
    /// * `buffer` - Input audio, consumed
    /// * `noise_floor_db` - Threshold relative to the strongest bin (negative)
    pub fn gate(&self, buffer: AudioBuffer, noise_floor_db: f32) -> Result<AudioBuffer> {
        if self.fft_size < 2 || self.hop == 0 || self.hop > self.fft_size {
            return Err(LofiError::stage(
                self.name(),
                format!("invalid STFT layout: size {}, hop {}", self.fft_size, self.hop),
            ));
        }

        let mut stft = Stft::new(self.fft_size);
        let half = self.fft_size / 2;

        // Pass 1: strongest bin across all channels and frames
        let mut peak_magnitude = 0.0_f32;
        for channel in &buffer.samples {
            for start in self.frame_starts(channel.len()) {
                stft.analyze(channel, start);
                for bin in &stft.frame[..=half] {
                    peak_magnitude = peak_magnitude.max(bin.norm());
                }
            }
        }

        if peak_magnitude <= 0.0 {
            debug!("denoise: silent buffer, nothing to gate");
            return Ok(buffer);
        }

        let threshold = peak_magnitude * db_to_linear(noise_floor_db);
        let gain_floor = db_to_linear(self.gain_floor_db);
        let len = buffer.len();
        let scale = 1.0 / self.fft_size as f32;

        debug!(
            "denoise: peak bin {:.3}, threshold {:.4} ({} dB)",
            peak_magnitude, threshold, noise_floor_db
        );

        // Overlap-add normalization is the same for every channel
        let mut norm = vec![0.0_f32; len];
        for start in self.frame_starts(len) {
            for (i, &w) in stft.window.iter().enumerate() {
                let t = start + i as i64;
                if t >= 0 && (t as usize) < len {
                    norm[t as usize] += w * w;
                }
            }
        }

        // Pass 2: gate and resynthesize
        let mut samples = Vec::with_capacity(buffer.channels());
        for channel in &buffer.samples {
            let mut output = vec![0.0_f32; len];
            let mut gains = vec![1.0_f32; half + 1];

            for start in self.frame_starts(len) {
                stft.analyze(channel, start);

                for (k, smoothed) in gains.iter_mut().enumerate() {
                    let magnitude = stft.frame[k].norm();
                    let target = if magnitude >= threshold {
                        1.0
                    } else {
                        ((magnitude / threshold).powi(2)).max(gain_floor)
                    };
                    *smoothed = if target >= *smoothed {
                        target
                    } else {
                        self.release * *smoothed + (1.0 - self.release) * target
                    };

                    stft.frame[k] *= *smoothed;
                    if k != 0 && k != half {
                        stft.frame[self.fft_size - k] *= *smoothed;
                    }
                }

                stft.synthesize();

                for (i, &w) in stft.window.iter().enumerate() {
                    let t = start + i as i64;
                    if t >= 0 && (t as usize) < len {
                        output[t as usize] += stft.frame[i].re * scale * w;
                    }
                }
            }

            for (s, &n) in output.iter_mut().zip(norm.iter()) {
                if n > 1e-9 {
                    *s /= n;
                }
            }
            samples.push(output);
        }

        Ok(AudioBuffer {
            samples,
            sample_rate: buffer.sample_rate,
        })
    }
}

impl Stage for Denoise {
    fn position(&self) -> StagePosition {
        StagePosition::Denoise
    }

    fn is_active(&self, params: &NormalizedParameters) -> bool {
        params.noise_floor_db.is_some()
    }

    fn apply(&self, buffer: AudioBuffer, params: &NormalizedParameters) -> Result<AudioBuffer> {
        match params.noise_floor_db {
            Some(floor) => self.gate(buffer, floor),
            None => Ok(buffer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    /// Bin-centred for a 2048-point FFT at 44.1 kHz (bin 46)
    const CENTRED_HZ: f32 = 46.0 * 44100.0 / 2048.0;

    #[test]
    fn test_silence_unchanged() {
        let buffer = AudioBuffer::new(2, 10000, 44100);
        let out = Denoise::default().gate(buffer.clone(), -20.0).unwrap();
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_clean_tone_passes() {
        let mut buffer = generate_test_tone(CENTRED_HZ, 1.0, 44100);
        buffer.scale(0.5);
        let out = Denoise::default().gate(buffer.clone(), -20.0).unwrap();

        assert_eq!(out.len(), buffer.len());
        for (a, b) in out.samples[0][4096..40000]
            .iter()
            .zip(buffer.samples[0][4096..40000].iter())
        {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_short_buffer_shorter_than_frame() {
        let buffer = AudioBuffer::mono(vec![0.1, -0.2, 0.3, -0.1], 44100);
        let out = Denoise::default().gate(buffer, -20.0).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.is_finite());
    }

    #[test]
    fn test_invalid_layout() {
        let buffer = generate_test_tone(440.0, 0.1, 44100);
        assert!(Denoise::new(1024, 0).gate(buffer, -20.0).is_err());
    }
}
