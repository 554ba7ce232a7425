//! Audio storage
//!
//! Persists buffers as WAV files named by a random UUID and hands back a
//! URL-style handle (`/uploads/<uuid>.wav`, `/processed/<uuid>.wav`) that
//! can be loaded again later.

use std::fs;
use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::engine::{encode_wav, import_audio, AudioBuffer, ExportFormat};
use crate::error::{LofiError, Result};

/// Handle prefix for raw extracted audio
pub const UPLOADS_PREFIX: &str = "/uploads";

/// Handle prefix for pipeline output
pub const PROCESSED_PREFIX: &str = "/processed";

/// Result of storing a buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAudio {
    /// Public handle, e.g. `/processed/<uuid>.wav`
    pub handle: String,
    /// Where the file was written
    pub path: PathBuf,
    /// SHA-256 of the file contents, lowercase hex
    pub sha256: String,
}

/// Somewhere buffers can be written and read back by handle
pub trait AudioSink: Send + Sync {
    fn store(&self, buffer: &AudioBuffer) -> Result<StoredAudio>;

    fn load(&self, handle: &str) -> Result<AudioBuffer>;
}

/// Directory of WAV files
#[derive(Debug, Clone)]
pub struct WavStore {
    dir: PathBuf,
    prefix: String,
    format: ExportFormat,
}

impl WavStore {
    /// # Arguments
    /// * `dir` - Directory the files live in (created on first store)
    /// * `prefix` - Handle prefix, e.g. `/uploads`
    /// * `format` - Sample encoding of written files
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, format: ExportFormat) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.trim_end_matches('/').to_string(),
            format,
        }
    }

    /// Handle for a stored file id
    pub fn handle_for(&self, id: &Uuid) -> String {
        format!("{}/{}.wav", self.prefix, id)
    }

    /// Map a handle back to its file path
    ///
    /// # Errors
    /// `InvalidHandle` unless the handle is `<prefix>/<uuid>.wav`.
    pub fn resolve(&self, handle: &str) -> Result<PathBuf> {
        let invalid = || LofiError::InvalidHandle {
            handle: handle.to_string(),
        };

        let name = handle
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(invalid)?;
        let id = name.strip_suffix(".wav").ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;

        Ok(self.dir.join(format!("{}.wav", id)))
    }
}

impl AudioSink for WavStore {
    fn store(&self, buffer: &AudioBuffer) -> Result<StoredAudio> {
        let bytes = encode_wav(buffer, self.format)?;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));

        fs::create_dir_all(&self.dir)?;
        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{}.wav", id));
        if let Err(e) = fs::write(&path, &bytes) {
            // Never leave a truncated file behind a handle
            if let Err(cleanup) = fs::remove_file(&path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not remove partial {}: {}", path.display(), cleanup);
                }
            }
            return Err(e.into());
        }
        let handle = self.handle_for(&id);

        info!("Stored {} ({} bytes)", handle, bytes.len());

        Ok(StoredAudio {
            handle,
            path,
            sha256,
        })
    }

    fn load(&self, handle: &str) -> Result<AudioBuffer> {
        let path = self.resolve(handle)?;
        if !path.is_file() {
            return Err(LofiError::HandleNotFound {
                handle: handle.to_string(),
            });
        }
        import_audio(&path)
    }
}
