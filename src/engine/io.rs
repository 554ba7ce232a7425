//! Audio file I/O
//!
//! Reads and writes PCM WAV files. Audio keeps its native sample rate and
//! channel count on import; the pipeline never resamples implicitly.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::AudioBuffer;
use crate::error::{LofiError, Result};

/// Bit depths accepted by `export_audio`
pub const SUPPORTED_BIT_DEPTHS: [u16; 3] = [16, 24, 32];

/// Export format configuration
///
/// The sample rate always follows the buffer; only the sample encoding is
/// configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24 (integer PCM) or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        Self::cd_quality()
    }
}

impl ExportFormat {
    /// Create a new export format, rejecting unsupported bit depths
    pub fn new(bit_depth: u16) -> Result<Self> {
        if !SUPPORTED_BIT_DEPTHS.contains(&bit_depth) {
            return Err(LofiError::UnsupportedFormat {
                format: format!("{}-bit audio (only 16, 24, 32 supported)", bit_depth),
            });
        }
        Ok(Self { bit_depth })
    }

    /// 16-bit integer PCM
    pub fn cd_quality() -> Self {
        Self { bit_depth: 16 }
    }

    /// 32-bit float
    pub fn float() -> Self {
        Self { bit_depth: 32 }
    }
}

/// Import a WAV file
///
/// # Arguments
/// * `path` - Path to the WAV file to import
///
/// # Returns
/// * `Ok(AudioBuffer)` - Decoded audio at the file's own sample rate
/// * `Err(LofiError)` - If the file cannot be read or holds no audio
///
/// # Errors
/// * `Io` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file
/// * `UnsupportedFormat` - For integer bit depths hound cannot map
/// * `UnsupportedBuffer` - If the file decodes to zero frames
pub fn import_audio(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(LofiError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }

    let reader = WavReader::open(path).map_err(|e| LofiError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(LofiError::unsupported_buffer("WAV header declares zero channels"));
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate)?;
    buffer.validate()?;

    Ok(buffer)
}

/// Export an AudioBuffer to a WAV file
///
/// # Arguments
/// * `buffer` - The audio buffer to export
/// * `path` - Path where the file will be written
/// * `format` - Sample encoding
pub fn export_audio(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    let spec = wav_spec(buffer, format)?;
    let writer = WavWriter::create(path, spec).map_err(hound_to_io)?;
    write_samples(writer, buffer, spec.bits_per_sample)
}

/// Encode an AudioBuffer as a complete WAV file in memory
///
/// # Errors
/// Same as `export_audio`, minus anything to do with the filesystem.
pub fn encode_wav(buffer: &AudioBuffer, format: ExportFormat) -> Result<Vec<u8>> {
    let spec = wav_spec(buffer, format)?;
    let mut cursor = Cursor::new(Vec::new());
    let writer = WavWriter::new(&mut cursor, spec).map_err(hound_to_io)?;
    write_samples(writer, buffer, spec.bits_per_sample)?;
    Ok(cursor.into_inner())
}

/// Generate a mono sine test tone at full scale
///
/// # Arguments
/// * `frequency` - Frequency of the sine wave in Hz
/// * `duration_secs` - Duration of the tone in seconds
/// * `sample_rate` - Sample rate in Hz
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    AudioBuffer::mono(sine(frequency, num_samples, sample_rate), sample_rate)
}

/// Generate a stereo test tone with different frequencies per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    AudioBuffer {
        samples: vec![
            sine(freq_left, num_samples, sample_rate),
            sine(freq_right, num_samples, sample_rate),
        ],
        sample_rate,
    }
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn sine(frequency: f32, num_samples: usize, sample_rate: u32) -> Vec<f32> {
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..num_samples)
        .map(|i| (angular_freq * i as f64).sin() as f32)
        .collect()
}

fn wav_spec(buffer: &AudioBuffer, format: ExportFormat) -> Result<WavSpec> {
    buffer.validate()?;
    let format = ExportFormat::new(format.bit_depth)?;

    Ok(WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    })
}

fn write_samples<W: Write + Seek>(
    mut writer: WavWriter<W>,
    buffer: &AudioBuffer,
    bit_depth: u16,
) -> Result<()> {
    let interleaved = buffer.to_interleaved();

    match bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(hound_to_io)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample).map_err(hound_to_io)?;
            }
        }
    }

    writer.finalize().map_err(hound_to_io)
}

fn hound_to_io(e: hound::Error) -> LofiError {
    match e {
        hound::Error::IoError(io) => LofiError::Io(io),
        other => LofiError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            other.to_string(),
        )),
    }
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let invalid = |bits: &str, e: hound::Error| LofiError::InvalidAudio {
        reason: format!("Failed to read {} samples: {}", bits, e),
        source: Some(Box::new(e)),
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| invalid("float", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("8-bit", e)),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("16-bit", e)),
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8388608.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("24-bit", e)),
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| invalid("32-bit int", e)),
            _ => Err(LofiError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(441.0, 1.0, 44100);

        assert_eq!(buffer.len(), 44100);
        assert_eq!(buffer.channels(), 1);

        // 100 samples per cycle, so sample 50 sits on a zero crossing
        assert!(buffer.samples[0][50].abs() < 1e-3);
        assert!((buffer.samples[0][25] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_generate_stereo_test_tone() {
        let buffer = generate_stereo_test_tone(440.0, 880.0, 0.5, 48000);

        assert_eq!(buffer.len(), 24000);
        assert_eq!(buffer.channels(), 2);
        assert!((buffer.samples[0][100] - buffer.samples[1][100]).abs() > 0.01);
    }

    #[test]
    fn test_export_format_rejects_8_bit() {
        assert!(matches!(
            ExportFormat::new(8),
            Err(LofiError::UnsupportedFormat { .. })
        ));
        assert_eq!(ExportFormat::default().bit_depth, 16);
    }

    #[test]
    fn test_export_import_keeps_rate_and_channels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let original = generate_stereo_test_tone(440.0, 660.0, 0.25, 22050);
        export_audio(&original, &path, ExportFormat::float()).unwrap();

        let imported = import_audio(&path).unwrap();
        assert_eq!(imported.sample_rate, 22050);
        assert_eq!(imported.channels(), 2);
        assert_eq!(imported.len(), original.len());
        assert_eq!(imported.samples, original.samples);
    }

    #[test]
    fn test_export_16_bit_quantization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone16.wav");

        let original = generate_test_tone(1000.0, 0.1, 44100);
        export_audio(&original, &path, ExportFormat::cd_quality()).unwrap();

        let imported = import_audio(&path).unwrap();
        for (a, b) in original.samples[0].iter().zip(imported.samples[0].iter()) {
            assert!((a - b).abs() < 1.0 / 8192.0);
        }
    }

    #[test]
    fn test_encode_wav_matches_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone24.wav");
        let tone = generate_stereo_test_tone(440.0, 550.0, 0.05, 48000);

        let bytes = encode_wav(&tone, ExportFormat::new(24).unwrap()).unwrap();
        export_audio(&tone, &path, ExportFormat::new(24).unwrap()).unwrap();

        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(bytes, std::fs::read(&path).unwrap());
    }

    #[test]
    fn test_encode_wav_rejects_bad_input() {
        let empty = AudioBuffer::new(2, 0, 44100);
        assert!(encode_wav(&empty, ExportFormat::default()).is_err());

        let tone = generate_test_tone(440.0, 0.01, 44100);
        assert!(matches!(
            encode_wav(&tone, ExportFormat { bit_depth: 8 }),
            Err(LofiError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_import_missing_file() {
        let result = import_audio(Path::new("/nonexistent/file.wav"));
        assert!(matches!(result, Err(LofiError::Io(_))));
    }

    #[test]
    fn test_import_garbage_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        assert!(matches!(
            import_audio(&path),
            Err(LofiError::InvalidAudio { .. })
        ));
    }

    #[test]
    fn test_export_rejects_empty_buffer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        let buffer = AudioBuffer::new(1, 0, 44100);
        assert!(export_audio(&buffer, &path, ExportFormat::default()).is_err());
    }
}
