//! Time-Stretch stage (WSOLA)
//!
//! Slows playback without changing pitch. Hann-windowed frames are laid
//! down at a fixed synthesis hop of half a window; each frame is read from
//! the input near `output_position * tempo_factor`, shifted within a small
//! tolerance so that it lines up with the natural continuation of the
//! previous frame. Alignment is searched on the mono mix and the same read
//! positions are used for every channel.

use log::debug;

use crate::dsp::settings::NormalizedParameters;
use crate::dsp::stage::{Stage, StagePosition};
use crate::engine::AudioBuffer;
use crate::error::{LofiError, Result};

/// Frame length in milliseconds
pub const DEFAULT_WINDOW_MS: f32 = 30.0;

/// Maximum alignment shift in milliseconds either side of the nominal position
pub const DEFAULT_TOLERANCE_MS: f32 = 10.0;

/// Candidate and sample stride of the coarse alignment pass
const COARSE_STRIDE: usize = 4;

/// Half-width of the full-resolution refinement around the coarse winner
const REFINE_RADIUS: i64 = COARSE_STRIDE as i64 - 1;

/// Smallest frame the stage will use, in samples
const MIN_WINDOW: usize = 64;

/// WSOLA time-stretcher
#[derive(Debug, Clone)]
pub struct TimeStretch {
    window_ms: f32,
    tolerance_ms: f32,
}

impl Default for TimeStretch {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            tolerance_ms: DEFAULT_TOLERANCE_MS,
        }
    }
}

impl TimeStretch {
    /// Output length for a given input length and tempo factor
    pub fn output_len(input_len: usize, tempo_factor: f32) -> usize {
        (input_len as f64 / tempo_factor as f64).round() as usize
    }

    /// Stretch `buffer` to `1 / tempo_factor` of its duration
    ///
    /// # Arguments
    /// * `buffer` - Input audio, consumed
    /// * `tempo_factor` - Playback speed ratio; values below 1.0 slow down
    ///
    /// # Returns
    /// A buffer of exactly `round(len / tempo_factor)` samples per channel at
    /// the same sample rate. A factor of exactly 1.0 returns the input as is.
    pub fn stretch(&self, buffer: AudioBuffer, tempo_factor: f32) -> Result<AudioBuffer> {
        if !tempo_factor.is_finite() || tempo_factor <= 0.0 {
            return Err(LofiError::stage(
                StagePosition::TimeStretch.name(),
                format!("tempo factor {} is not a positive number", tempo_factor),
            ));
        }
        if tempo_factor == 1.0 {
            return Ok(buffer);
        }

        let sample_rate = buffer.sample_rate;
        let window = self.window_len(sample_rate);
        let hop = window / 2;
        let tolerance = ((self.tolerance_ms / 1000.0) * sample_rate as f32).round() as i64;
        let out_len = Self::output_len(buffer.len(), tempo_factor);

        let mono = buffer.mono_mix();
        let positions = plan_read_positions(&mono, tempo_factor, out_len, window, tolerance);
        let hann = hann_window(window);

        debug!(
            "time_stretch: factor={:.3} window={} hop={} frames={} {} -> {} samples",
            tempo_factor,
            window,
            hop,
            positions.len(),
            buffer.len(),
            out_len
        );

        let mut output = vec![vec![0.0_f32; out_len]; buffer.channels()];
        let mut weight = vec![0.0_f32; out_len];

        for (k, &read_pos) in positions.iter().enumerate() {
            let write_pos = frame_start(k, hop);
            for (i, &w) in hann.iter().enumerate() {
                let t = write_pos + i as i64;
                if t < 0 || t >= out_len as i64 {
                    continue;
                }
                let t = t as usize;
                weight[t] += w;
                for (out_ch, in_ch) in output.iter_mut().zip(buffer.samples.iter()) {
                    out_ch[t] += sample_at(in_ch, read_pos + i as i64) * w;
                }
            }
        }

        for channel in &mut output {
            for (s, &w) in channel.iter_mut().zip(weight.iter()) {
                if w > 1e-6 {
                    *s /= w;
                }
            }
        }

        Ok(AudioBuffer {
            samples: output,
            sample_rate,
        })
    }

    fn window_len(&self, sample_rate: u32) -> usize {
        let raw = ((self.window_ms / 1000.0) * sample_rate as f32).round() as usize;
        let even = raw + raw % 2;
        even.max(MIN_WINDOW)
    }
}

impl Stage for TimeStretch {
    fn position(&self) -> StagePosition {
        StagePosition::TimeStretch
    }

    fn is_active(&self, params: &NormalizedParameters) -> bool {
        params.stretches()
    }

    fn apply(&self, buffer: AudioBuffer, params: &NormalizedParameters) -> Result<AudioBuffer> {
        self.stretch(buffer, params.tempo_factor)
    }
}

// ============================================================================
// Frame planning
// ============================================================================

/// Output position of frame `k`; the first frame starts half a window early
/// so every output sample is covered by two frames.
#[inline]
fn frame_start(k: usize, hop: usize) -> i64 {
    k as i64 * hop as i64 - hop as i64
}

#[inline]
fn sample_at(x: &[f32], index: i64) -> f32 {
    if index >= 0 && (index as usize) < x.len() {
        x[index as usize]
    } else {
        0.0
    }
}

/// Input read position for every frame
fn plan_read_positions(
    mono: &[f32],
    tempo_factor: f32,
    out_len: usize,
    window: usize,
    tolerance: i64,
) -> Vec<i64> {
    let hop = window / 2;
    let frame_count = (out_len + hop) / hop + 1;
    let mut positions = Vec::with_capacity(frame_count);

    for k in 0..frame_count {
        let nominal = (frame_start(k, hop) as f64 * tempo_factor as f64).round() as i64;
        let read_pos = match positions.last() {
            None => nominal,
            Some(&previous) => {
                let continuation = previous + hop as i64;
                best_alignment(mono, continuation, nominal, hop, tolerance)
            }
        };
        positions.push(read_pos);
    }

    positions
}

/// Candidate in `nominal ± tolerance` whose first `overlap` samples best
/// match the samples starting at `reference`
fn best_alignment(mono: &[f32], reference: i64, nominal: i64, overlap: usize, tolerance: i64) -> i64 {
    let mut best = nominal;
    let mut best_score = similarity(mono, reference, nominal, overlap, COARSE_STRIDE);

    let mut candidate = nominal - tolerance;
    while candidate <= nominal + tolerance {
        let score = similarity(mono, reference, candidate, overlap, COARSE_STRIDE);
        if score > best_score {
            best_score = score;
            best = candidate;
        }
        candidate += COARSE_STRIDE as i64;
    }

    let centre = best;
    let mut best_score = similarity(mono, reference, centre, overlap, 1);
    for candidate in (centre - REFINE_RADIUS)..=(centre + REFINE_RADIUS) {
        if candidate == centre || (candidate - nominal).abs() > tolerance {
            continue;
        }
        let score = similarity(mono, reference, candidate, overlap, 1);
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }

    best
}

/// Cross-correlation normalized by the candidate's energy
fn similarity(x: &[f32], reference: i64, candidate: i64, len: usize, stride: usize) -> f32 {
    let mut cross = 0.0_f32;
    let mut energy = 0.0_f32;
    let mut j = 0;
    while j < len {
        let c = sample_at(x, candidate + j as i64);
        cross += sample_at(x, reference + j as i64) * c;
        energy += c * c;
        j += stride;
    }
    cross / (energy + 1e-9).sqrt()
}

/// Periodic Hann window; overlapping copies at half-window hops sum to one
fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / len as f32).cos()))
        .collect()
}
