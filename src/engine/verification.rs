//! Audio verification utilities
//!
//! Objective measurements used by the CLI `analyze` command and by the
//! audio quality tests: levels, spectra and pitch. Nothing here needs a
//! listener.
//!
//! # Measurements
//! - RMS and peak level
//! - Crest factor (peak/RMS ratio)
//! - Clipping and DC offset
//! - Averaged magnitude spectrum (FFT)
//! - Band energy
//! - Fundamental frequency (autocorrelation)

use rustfft::{num_complex::Complex, FftPlanner};

use crate::engine::buffer::{linear_to_db, AudioBuffer};

/// Threshold for considering a sample as clipped (at digital maximum)
const CLIP_THRESHOLD: f32 = 0.9999;

/// Complete audio analysis results
#[derive(Debug, Clone)]
pub struct AudioAnalysis {
    /// RMS level in linear scale
    pub rms_linear: f32,
    /// RMS level in dBFS
    pub rms_db: f32,
    /// Peak level in linear scale
    pub peak_linear: f32,
    /// Peak level in dBFS
    pub peak_db: f32,
    /// Crest factor (peak/RMS) in dB
    pub crest_factor_db: f32,
    /// Number of clipped samples
    pub clipped_samples: usize,
    /// Percentage of samples that are clipped
    pub clip_percentage: f32,
    /// DC offset (mean of all samples)
    pub dc_offset: f32,
    /// Duration in seconds
    pub duration: f64,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: usize,
    /// Estimated fundamental of the mono mix, if one was found
    pub fundamental_hz: Option<f32>,
}

impl AudioAnalysis {
    /// Analyze an audio buffer across all channels
    pub fn analyze(buffer: &AudioBuffer) -> Self {
        let all: Vec<f32> = buffer.samples.iter().flatten().copied().collect();
        let num_samples = all.len();

        let rms_linear = calculate_rms(&all);
        let rms_db = linear_to_db(rms_linear);
        let peak_linear = calculate_peak(&all);
        let peak_db = linear_to_db(peak_linear);

        let crest_factor_db = if rms_linear > 0.0 {
            peak_db - rms_db
        } else {
            0.0
        };

        let clipped_samples = count_clipped_samples(&all);
        let clip_percentage = if num_samples > 0 {
            (clipped_samples as f32 / num_samples as f32) * 100.0
        } else {
            0.0
        };

        let fundamental_hz = estimate_fundamental(&buffer.mono_mix(), buffer.sample_rate, 50.0, 2000.0);

        Self {
            rms_linear,
            rms_db,
            peak_linear,
            peak_db,
            crest_factor_db,
            clipped_samples,
            clip_percentage,
            dc_offset: calculate_dc_offset(&all),
            duration: buffer.duration_secs(),
            sample_rate: buffer.sample_rate,
            channels: buffer.channels(),
            fundamental_hz,
        }
    }

    /// Check if audio is clipping
    pub fn is_clipping(&self) -> bool {
        self.clip_percentage > 1.0
    }

    /// Check if DC offset is significant
    pub fn has_dc_offset(&self) -> bool {
        self.dc_offset.abs() > 0.01
    }

    /// Generate a summary string for display
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Duration: {:.2}s | {} ch @ {} Hz\n\
             RMS: {:.1} dBFS | Peak: {:.1} dBFS | Crest: {:.1} dB\n\
             DC Offset: {:.4}",
            self.duration,
            self.channels,
            self.sample_rate,
            self.rms_db,
            self.peak_db,
            self.crest_factor_db,
            self.dc_offset
        );

        if self.clipped_samples > 0 {
            s.push_str(&format!(
                "\nClipping: {} samples ({:.2}%)",
                self.clipped_samples, self.clip_percentage
            ));
        }

        if let Some(f0) = self.fundamental_hz {
            s.push_str(&format!("\nFundamental: {:.1} Hz", f0));
        }

        s
    }
}

/// Calculate RMS (Root Mean Square) of samples
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Calculate RMS in decibels
pub fn calculate_rms_db(samples: &[f32]) -> f32 {
    linear_to_db(calculate_rms(samples))
}

/// Calculate peak (maximum absolute value) of samples
pub fn calculate_peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Calculate crest factor (peak/RMS ratio) in dB
pub fn calculate_crest_factor(samples: &[f32]) -> f32 {
    let rms = calculate_rms(samples);
    let peak = calculate_peak(samples);
    if rms > 0.0 {
        linear_to_db(peak / rms)
    } else {
        0.0
    }
}

/// Count samples that are clipped (at or near digital maximum)
pub fn count_clipped_samples(samples: &[f32]) -> usize {
    samples.iter().filter(|s| s.abs() >= CLIP_THRESHOLD).count()
}

/// Calculate DC offset (mean of samples)
pub fn calculate_dc_offset(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| s as f64).sum();
    (sum / samples.len() as f64) as f32
}

// ============================================================================
// Spectral analysis
// ============================================================================

/// Spectral analysis result at a specific frequency
#[derive(Debug, Clone)]
pub struct SpectralPeak {
    pub frequency: f32,
    pub magnitude_db: f32,
}

/// Averaged magnitude spectrum of the buffer's mono mix
///
/// Hann-windowed frames of `fft_size` with 50% overlap are averaged in the
/// power domain. Magnitudes are scaled so a full-scale sine reads ~0 dB.
/// Returns an empty vector when the buffer is shorter than one frame.
pub fn analyze_spectrum(buffer: &AudioBuffer, fft_size: usize) -> Vec<SpectralPeak> {
    let samples = buffer.mono_mix();
    if fft_size < 2 || samples.len() < fft_size {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_size);

    let window: Vec<f32> = (0..fft_size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos()))
        .collect();
    let window_sum: f32 = window.iter().sum();
    let half = fft_size / 2;
    let hop = half.max(1);

    let mut power = vec![0.0_f64; half];
    let mut frames = 0usize;
    let mut frame: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); fft_size];

    let mut start = 0;
    while start + fft_size <= samples.len() {
        for (slot, (&s, &w)) in frame
            .iter_mut()
            .zip(samples[start..start + fft_size].iter().zip(window.iter()))
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut frame);

        for (acc, bin) in power.iter_mut().zip(frame.iter()) {
            let magnitude = bin.norm() * 2.0 / window_sum;
            *acc += (magnitude as f64) * (magnitude as f64);
        }
        frames += 1;
        start += hop;
    }

    let bin_hz = buffer.sample_rate as f32 / fft_size as f32;
    power
        .iter()
        .enumerate()
        .map(|(i, &p)| SpectralPeak {
            frequency: i as f32 * bin_hz,
            magnitude_db: linear_to_db((p / frames as f64).sqrt() as f32),
        })
        .collect()
}

/// Get magnitude at a specific frequency (nearest bin) in dB
pub fn magnitude_at_frequency(buffer: &AudioBuffer, frequency: f32, fft_size: usize) -> f32 {
    let spectrum = analyze_spectrum(buffer, fft_size);
    let bin_hz = buffer.sample_rate as f32 / fft_size as f32;
    let target_bin = (frequency / bin_hz).round() as usize;

    spectrum
        .get(target_bin)
        .map(|p| p.magnitude_db)
        .unwrap_or(f32::NEG_INFINITY)
}

/// Total energy between `low_hz` and `high_hz` in dB
pub fn band_energy_db(buffer: &AudioBuffer, low_hz: f32, high_hz: f32, fft_size: usize) -> f32 {
    let energy: f64 = analyze_spectrum(buffer, fft_size)
        .iter()
        .filter(|p| p.frequency >= low_hz && p.frequency <= high_hz)
        .map(|p| {
            let linear = 10.0_f64.powf(p.magnitude_db as f64 / 20.0);
            linear * linear
        })
        .sum();

    if energy <= 0.0 {
        f32::NEG_INFINITY
    } else {
        (10.0 * energy.log10()) as f32
    }
}

// ============================================================================
// Pitch
// ============================================================================

/// Estimate the fundamental frequency with normalized autocorrelation
///
/// Analyses a segment from the middle of `samples`, picks the first
/// correlation peak within 90% of the strongest one (avoids octave errors)
/// and refines it with parabolic interpolation.
///
/// # Returns
/// `None` when the signal is too short, silent, or has no periodicity in
/// `[min_hz, max_hz]`.
pub fn estimate_fundamental(
    samples: &[f32],
    sample_rate: u32,
    min_hz: f32,
    max_hz: f32,
) -> Option<f32> {
    if sample_rate == 0 || min_hz <= 0.0 || max_hz <= min_hz {
        return None;
    }

    let min_lag = ((sample_rate as f32 / max_hz).floor() as usize).max(2);
    let max_lag = (sample_rate as f32 / min_hz).ceil() as usize;
    let window = (4 * max_lag).max(2048);

    if samples.len() < window + max_lag + 1 {
        return None;
    }

    let start = (samples.len() - window - max_lag - 1) / 2;
    let segment = &samples[start..start + window + max_lag + 1];

    let energy = |offset: usize| -> f64 {
        segment[offset..offset + window]
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum()
    };
    let base_energy = energy(0);
    if base_energy <= 1e-12 {
        return None;
    }

    let correlations: Vec<f64> = (min_lag - 1..=max_lag + 1)
        .map(|lag| {
            let cross: f64 = segment[..window]
                .iter()
                .zip(segment[lag..lag + window].iter())
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum();
            let denom = (base_energy * energy(lag)).sqrt();
            if denom > 0.0 {
                cross / denom
            } else {
                0.0
            }
        })
        .collect();

    let best = correlations.iter().copied().fold(f64::MIN, f64::max);
    if best < 0.5 {
        return None;
    }

    for i in 1..correlations.len() - 1 {
        let (prev, here, next) = (correlations[i - 1], correlations[i], correlations[i + 1]);
        if here >= prev && here >= next && here >= 0.9 * best {
            let curvature = prev - 2.0 * here + next;
            let delta = if curvature.abs() > 1e-12 {
                0.5 * (prev - next) / curvature
            } else {
                0.0
            };
            let lag = (min_lag - 1 + i) as f64 + delta;
            return Some((sample_rate as f64 / lag) as f32);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    #[test]
    fn test_rms_sine_wave() {
        let buffer = generate_test_tone(440.0, 1.0, 44100);
        let rms = calculate_rms(&buffer.samples[0]);
        assert!((rms - 0.707).abs() < 0.01);
    }

    #[test]
    fn test_rms_silence() {
        assert_eq!(calculate_rms(&[0.0; 1000]), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_crest_factor_sine() {
        let buffer = generate_test_tone(440.0, 1.0, 44100);
        let crest = calculate_crest_factor(&buffer.samples[0]);
        assert!((crest - 3.01).abs() < 0.1);
    }

    #[test]
    fn test_dc_offset_detection() {
        let samples = vec![0.1; 44100];
        assert!((calculate_dc_offset(&samples) - 0.1).abs() < 0.001);

        let buffer = generate_test_tone(440.0, 1.0, 44100);
        assert!(calculate_dc_offset(&buffer.samples[0]).abs() < 0.01);
    }

    #[test]
    fn test_audio_analysis() {
        let mut buffer = generate_test_tone(440.0, 1.0, 44100);
        buffer.scale(0.9);
        let analysis = AudioAnalysis::analyze(&buffer);

        assert!((analysis.rms_db - (-3.93)).abs() < 0.2);
        assert!((analysis.peak_db - (-0.92)).abs() < 0.2);
        assert_eq!(analysis.clipped_samples, 0);
        assert!(!analysis.is_clipping());
        assert!(!analysis.has_dc_offset());
        assert!(analysis.summary().contains("44100 Hz"));
    }

    #[test]
    fn test_spectral_analysis() {
        let buffer = generate_test_tone(440.0, 1.0, 44100);

        let mag_440 = magnitude_at_frequency(&buffer, 440.0, 4096);
        let mag_1000 = magnitude_at_frequency(&buffer, 1000.0, 4096);

        assert!(mag_440 > mag_1000 + 20.0);
        // Full-scale sine reads close to 0 dB (within scalloping loss)
        assert!(mag_440 > -2.0 && mag_440 < 0.5);
    }

    #[test]
    fn test_band_energy() {
        let buffer = generate_test_tone(1000.0, 1.0, 44100);
        let in_band = band_energy_db(&buffer, 500.0, 1500.0, 4096);
        let out_of_band = band_energy_db(&buffer, 5000.0, 15000.0, 4096);
        assert!(in_band > out_of_band + 40.0);
    }

    #[test]
    fn test_spectrum_too_short() {
        let buffer = generate_test_tone(440.0, 0.01, 44100);
        assert!(analyze_spectrum(&buffer, 4096).is_empty());
    }

    #[test]
    fn test_estimate_fundamental() {
        for freq in [110.0_f32, 440.0, 1234.0] {
            let buffer = generate_test_tone(freq, 0.5, 44100);
            let estimate = estimate_fundamental(&buffer.samples[0], 44100, 50.0, 2000.0).unwrap();
            assert!(
                (estimate - freq).abs() / freq < 0.005,
                "expected {} Hz, got {} Hz",
                freq,
                estimate
            );
        }
    }

    #[test]
    fn test_estimate_fundamental_silence() {
        assert!(estimate_fundamental(&[0.0; 44100], 44100, 50.0, 2000.0).is_none());
    }
}
