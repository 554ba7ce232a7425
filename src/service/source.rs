//! Audio sources
//!
//! Where raw audio comes from. Locators are either a video link or a path
//! to a WAV file; `FileSource` resolves video ids against a local library
//! directory of pre-extracted audio.

use std::fmt;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::engine::{import_audio, AudioBuffer};
use crate::error::{LofiError, Result};

/// Length of a video id
pub const VIDEO_ID_LEN: usize = 11;

const VIDEO_PREFIXES: [&str; 2] = ["youtube.com/watch?v=", "youtu.be/"];

/// Parsed reference to some source audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceLocator {
    /// Video link, reduced to its id
    Video { id: String },
    /// Local WAV file
    File { path: PathBuf },
}

impl SourceLocator {
    /// Parse a video link or a `.wav` path
    ///
    /// Video links are `youtube.com/watch?v=<id>` or `youtu.be/<id>`, found
    /// anywhere in the input, where `<id>` is 11 characters of
    /// `[A-Za-z0-9_-]`.
    ///
    /// # Errors
    /// * `MissingField` - for empty input
    /// * `InvalidLocator` - for anything that is neither a video link nor a `.wav` path
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LofiError::missing("youtubeUrl", "YouTube URL is required"));
        }

        for prefix in VIDEO_PREFIXES {
            if let Some(at) = input.find(prefix) {
                let rest = &input[at + prefix.len()..];
                let id: String = rest.chars().take(VIDEO_ID_LEN).collect();
                if id.chars().count() == VIDEO_ID_LEN && id.chars().all(is_id_char) {
                    return Ok(SourceLocator::Video { id });
                }
            }
        }

        let is_wav = Path::new(input)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if is_wav {
            return Ok(SourceLocator::File {
                path: PathBuf::from(input),
            });
        }

        Err(LofiError::InvalidLocator {
            locator: input.to_string(),
        })
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Video { id } => write!(f, "video:{}", id),
            SourceLocator::File { path } => write!(f, "file:{}", path.display()),
        }
    }
}

/// Decoded source audio with a display title
#[derive(Debug, Clone)]
pub struct SourceAudio {
    pub title: String,
    pub buffer: AudioBuffer,
}

/// Something that can turn a locator into audio
pub trait AudioSource: Send + Sync {
    fn fetch(&self, locator: &SourceLocator) -> Result<SourceAudio>;
}

/// Reads WAV files from disk
///
/// Video ids map to `<library_dir>/<id>.wav`.
#[derive(Debug, Clone)]
pub struct FileSource {
    library_dir: PathBuf,
}

impl FileSource {
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
        }
    }

    /// File a locator refers to
    pub fn resolve(&self, locator: &SourceLocator) -> PathBuf {
        match locator {
            SourceLocator::Video { id } => self.library_dir.join(format!("{}.wav", id)),
            SourceLocator::File { path } => path.clone(),
        }
    }
}

impl AudioSource for FileSource {
    fn fetch(&self, locator: &SourceLocator) -> Result<SourceAudio> {
        let path = self.resolve(locator);
        if !path.is_file() {
            return Err(LofiError::SourceUnavailable {
                locator: locator.to_string(),
                reason: format!("{} not found", path.display()),
            });
        }

        let buffer = import_audio(&path)?;
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| locator.to_string());

        info!(
            "Fetched '{}' ({:.2}s, {} ch @ {} Hz)",
            title,
            buffer.duration_secs(),
            buffer.channels(),
            buffer.sample_rate
        );

        Ok(SourceAudio { title, buffer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{export_audio, generate_test_tone, ExportFormat};
    use tempfile::tempdir;

    #[test]
    fn test_parse_watch_url() {
        let locator = SourceLocator::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").unwrap();
        assert_eq!(
            locator,
            SourceLocator::Video {
                id: "dQw4w9WgXcQ".to_string()
            }
        );
    }

    #[test]
    fn test_parse_short_url() {
        let locator = SourceLocator::parse("https://youtu.be/abc_DEF-123").unwrap();
        assert_eq!(
            locator,
            SourceLocator::Video {
                id: "abc_DEF-123".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert!(SourceLocator::parse("https://youtu.be/short").is_err());
        assert!(SourceLocator::parse("https://youtu.be/has space!!").is_err());
        assert!(SourceLocator::parse("https://vimeo.com/12345").is_err());
    }

    #[test]
    fn test_parse_empty() {
        let err = SourceLocator::parse("   ").unwrap_err();
        assert!(matches!(err, LofiError::MissingField { .. }));
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "YouTube URL is required");
    }

    #[test]
    fn test_parse_wav_path() {
        assert_eq!(
            SourceLocator::parse("/music/Track One.WAV").unwrap(),
            SourceLocator::File {
                path: PathBuf::from("/music/Track One.WAV")
            }
        );
        assert!(SourceLocator::parse("/music/track.mp3").is_err());
    }

    #[test]
    fn test_file_source_library_lookup() {
        let dir = tempdir().unwrap();
        let tone = generate_test_tone(440.0, 0.1, 44100);
        export_audio(&tone, &dir.path().join("dQw4w9WgXcQ.wav"), ExportFormat::float()).unwrap();

        let source = FileSource::new(dir.path());
        let audio = source
            .fetch(&SourceLocator::parse("youtu.be/dQw4w9WgXcQ").unwrap())
            .unwrap();
        assert_eq!(audio.title, "dQw4w9WgXcQ");
        assert_eq!(audio.buffer, tone);
    }

    #[test]
    fn test_file_source_missing() {
        let dir = tempdir().unwrap();
        let source = FileSource::new(dir.path());
        let err = source
            .fetch(&SourceLocator::Video {
                id: "00000000000".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, LofiError::SourceUnavailable { .. }));
        assert_eq!(err.status_code(), 500);
    }
}
