//! Audio Buffer Management
//!
//! Provides the core audio buffer type handed from stage to stage.
//! Samples are non-interleaved 32-bit floats normalized to [-1.0, 1.0].

use crate::error::{LofiError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Sample rate used when nothing else is specified
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Core audio buffer type for the lo-fi pipeline
///
/// Stores audio as non-interleaved 32-bit floating point samples.
/// Each channel is a separate `Vec<f32>`; all channels have the same length.
///
/// # Example
/// ```
/// use lofi::engine::buffer::AudioBuffer;
///
/// // 1 second of stereo silence at 44.1kHz
/// let buffer = AudioBuffer::new(2, 44100, 44100);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 44100);
/// assert!(buffer.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new zeroed buffer
    pub fn new(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Fails with `UnsupportedBuffer` if the channels differ in length.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let buffer = Self {
            samples,
            sample_rate,
        };
        buffer.check_channel_lengths()?;
        Ok(buffer)
    }

    /// Create a mono buffer from a single sample vector
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: vec![samples],
            sample_rate,
        }
    }

    /// Create an audio buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `num_channels` - Number of interleaved channels
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        num_channels: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(LofiError::unsupported_buffer("zero channels"));
        }

        if interleaved.len() % num_channels != 0 {
            return Err(LofiError::unsupported_buffer(format!(
                "interleaved data length {} is not divisible by channel count {}",
                interleaved.len(),
                num_channels
            )));
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();

        if num_channels == 0 || num_samples == 0 {
            return Vec::new();
        }

        let mut interleaved = Vec::with_capacity(num_channels * num_samples);

        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get a sample at the specified channel and index
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Average all channels into one
    pub fn mono_mix(&self) -> Vec<f32> {
        let num_channels = self.channels();
        if num_channels == 1 {
            return self.samples[0].clone();
        }

        let mut mix = vec![0.0_f32; self.len()];
        if num_channels == 0 {
            return mix;
        }

        let scale = 1.0 / num_channels as f32;
        for channel in &self.samples {
            for (acc, &s) in mix.iter_mut().zip(channel.iter()) {
                *acc += s * scale;
            }
        }
        mix
    }

    /// Check the buffer invariants required by the pipeline
    ///
    /// # Errors
    /// `UnsupportedBuffer` for zero channels, zero sample rate, zero length
    /// or channels of unequal length.
    pub fn validate(&self) -> Result<()> {
        if self.channels() == 0 {
            return Err(LofiError::unsupported_buffer("buffer has no channels"));
        }

        if self.sample_rate == 0 {
            return Err(LofiError::unsupported_buffer("sample rate is zero"));
        }

        self.check_channel_lengths()?;

        if self.is_empty() {
            return Err(LofiError::unsupported_buffer("buffer contains no samples"));
        }

        Ok(())
    }

    fn check_channel_lengths(&self) -> Result<()> {
        let expected = self.len();
        if let Some((index, channel)) = self
            .samples
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.len() != expected)
        {
            return Err(LofiError::unsupported_buffer(format!(
                "channel {} has {} samples, channel 0 has {}",
                index,
                channel.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Check if all samples are finite (not NaN or Infinity)
    pub fn is_finite(&self) -> bool {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .all(|s| s.is_finite())
    }

    /// Largest absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Scale all samples by a linear factor
    pub fn scale(&mut self, factor: f32) {
        for channel in &mut self.samples {
            for sample in channel.iter_mut() {
                *sample *= factor;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_buffer(samples: Vec<Vec<f32>>) -> AudioBuffer {
        AudioBuffer {
            samples,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    // ------------------------------------------------------------------------
    // Unit conversion tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_db_to_linear() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-4);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert!(db_to_linear(-120.0) < 1e-5);
    }

    #[test]
    fn test_linear_to_db() {
        assert!((linear_to_db(1.0) - 0.0).abs() < 1e-6);
        assert!((linear_to_db(0.1) - (-20.0)).abs() < 1e-4);
        assert!(linear_to_db(0.0).is_infinite() && linear_to_db(0.0).is_sign_negative());
    }

    // ------------------------------------------------------------------------
    // AudioBuffer tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_buffer_new() {
        let buffer = AudioBuffer::new(2, 1000, 48000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.sample_rate, 48000);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(1, DEFAULT_SAMPLE_RATE as usize, DEFAULT_SAMPLE_RATE);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_buffer_from_interleaved_stereo() {
        let interleaved = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, DEFAULT_SAMPLE_RATE).unwrap();

        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.get_sample(0, 0), Some(0.1));
        assert_eq!(buffer.get_sample(1, 0), Some(0.2));
        assert_eq!(buffer.get_sample(0, 1), Some(0.3));
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_buffer_from_interleaved_invalid() {
        let interleaved = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        assert!(AudioBuffer::from_interleaved(&interleaved, 2, DEFAULT_SAMPLE_RATE).is_err());
        assert!(AudioBuffer::from_interleaved(&interleaved, 0, DEFAULT_SAMPLE_RATE).is_err());
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 10], vec![0.0; 9]], 44100);
        assert!(matches!(result, Err(LofiError::UnsupportedBuffer { .. })));
    }

    #[test]
    fn test_mono_mix() {
        let buffer = create_test_buffer(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(buffer.mono_mix(), vec![0.5, 0.5]);
    }

    // ------------------------------------------------------------------------
    // Validation tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_validate_ok() {
        let buffer = AudioBuffer::new(1, 100, 44100);
        assert!(buffer.validate().is_ok());
    }

    #[test]
    fn test_validate_empty() {
        let buffer = AudioBuffer::new(1, 0, 44100);
        assert!(matches!(
            buffer.validate(),
            Err(LofiError::UnsupportedBuffer { .. })
        ));
    }

    #[test]
    fn test_validate_zero_sample_rate() {
        let buffer = AudioBuffer::new(1, 100, 0);
        let err = buffer.validate().unwrap_err();
        assert!(err.to_string().contains("sample rate"));
    }

    #[test]
    fn test_validate_no_channels() {
        let buffer = create_test_buffer(vec![]);
        assert!(buffer.validate().is_err());
    }

    #[test]
    fn test_validate_mismatched_channels() {
        let buffer = create_test_buffer(vec![vec![0.0; 100], vec![0.0; 50]]);
        let err = buffer.validate().unwrap_err();
        assert!(err.to_string().contains("channel 1"));
    }

    // ------------------------------------------------------------------------
    // Buffer utility tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_buffer_is_finite() {
        assert!(create_test_buffer(vec![vec![0.5; 100]]).is_finite());
        assert!(!create_test_buffer(vec![vec![f32::NAN; 100]]).is_finite());
        assert!(!create_test_buffer(vec![vec![f32::INFINITY; 100]]).is_finite());
    }

    #[test]
    fn test_buffer_scale_and_peak() {
        let mut buffer = create_test_buffer(vec![vec![-2.0, -0.5, 0.0, 0.5, 1.0]]);
        assert_eq!(buffer.peak(), 2.0);
        buffer.scale(0.25);
        assert_eq!(buffer.get_sample(0, 0), Some(-0.5));
        assert_eq!(buffer.get_sample(0, 4), Some(0.25));
        assert_eq!(buffer.peak(), 0.5);
    }
}
