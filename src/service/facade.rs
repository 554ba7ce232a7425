//! Request façade
//!
//! The two operations a front end needs: `extract` pulls source audio into
//! the uploads store, `process` runs a stored upload through the pipeline
//! on the worker pool and stores the result. Requests and responses use
//! camelCase JSON field names.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::LofiConfig;
use crate::dsp::LofiSettings;
use crate::engine::{AudioBuffer, ExportFormat};
use crate::error::{LofiError, Result};
use crate::service::pool::{PendingJob, WorkerPool};
use crate::service::source::{AudioSource, FileSource, SourceLocator};
use crate::service::store::{AudioSink, StoredAudio, WavStore, PROCESSED_PREFIX, UPLOADS_PREFIX};

pub const PROCESSED_MESSAGE: &str = "Audio processed successfully";

/// Message for a process request without a handle or settings
pub const PROCESS_FIELDS_REQUIRED: &str = "Audio URL and settings are required";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub youtube_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub title: String,
    pub audio_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub audio_url: String,
    /// Absent settings are rejected, not defaulted
    pub settings: Option<LofiSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub processed_audio_url: String,
    pub message: String,
}

/// Failure as reported to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub code: String,
    pub status: u16,
}

impl ErrorResponse {
    /// Client errors carry their own message; server errors get `context`
    /// as the message and the cause in `error`.
    pub fn from_error(context: &str, err: &LofiError) -> Self {
        let (message, error) = if err.is_client_error() {
            (err.to_string(), None)
        } else {
            (context.to_string(), Some(err.to_string()))
        };
        Self {
            message,
            error,
            code: err.error_code().to_string(),
            status: err.status_code(),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct LofiService {
    source: Arc<dyn AudioSource>,
    uploads: Arc<dyn AudioSink>,
    processed: Arc<dyn AudioSink>,
    pool: WorkerPool,
}

impl LofiService {
    pub fn new(
        source: Arc<dyn AudioSource>,
        uploads: Arc<dyn AudioSink>,
        processed: Arc<dyn AudioSink>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            source,
            uploads,
            processed,
            pool,
        }
    }

    /// File-backed service wired from configuration
    pub fn from_config(config: &LofiConfig) -> Result<Self> {
        config.validate()?;
        let format = ExportFormat::new(config.export.bit_depth)?;

        Ok(Self::new(
            Arc::new(FileSource::new(&config.storage.library_dir)),
            Arc::new(WavStore::new(&config.storage.uploads_dir, UPLOADS_PREFIX, format)),
            Arc::new(WavStore::new(&config.storage.processed_dir, PROCESSED_PREFIX, format)),
            WorkerPool::new(config.workers.worker_count, config.workers.queue_capacity)?,
        ))
    }

    /// Fetch source audio and store it as an upload
    pub fn extract(&self, request: &ExtractRequest) -> Result<ExtractResponse> {
        let locator = SourceLocator::parse(&request.youtube_url)?;
        let audio = self.source.fetch(&locator)?;
        let stored = self.uploads.store(&audio.buffer)?;

        info!("Extracted '{}' to {}", audio.title, stored.handle);

        Ok(ExtractResponse {
            title: audio.title,
            audio_url: stored.handle,
        })
    }

    /// Run a stored upload through the pipeline
    ///
    /// Loading and storing run on tokio's blocking threads; the pipeline
    /// runs on the worker pool. The calling task only awaits.
    pub async fn process(&self, request: &ProcessRequest) -> Result<ProcessResponse> {
        let settings = required_settings(request)?;

        let uploads = Arc::clone(&self.uploads);
        let handle = request.audio_url.clone();
        let buffer = off_runtime(move || uploads.load(&handle)).await?;

        let output = self.queue(&request.audio_url, buffer, settings)?.wait().await?;

        let processed = Arc::clone(&self.processed);
        let stored = off_runtime(move || processed.store(&output)).await?;
        Ok(processed_response(stored))
    }

    /// Blocking variant of `process` for synchronous callers
    pub fn process_blocking(&self, request: &ProcessRequest) -> Result<ProcessResponse> {
        let settings = required_settings(request)?;
        let buffer = self.uploads.load(&request.audio_url)?;
        let output = self
            .queue(&request.audio_url, buffer, settings)?
            .wait_blocking()?;
        let stored = self.processed.store(&output)?;
        Ok(processed_response(stored))
    }

    fn queue(&self, handle: &str, buffer: AudioBuffer, settings: LofiSettings) -> Result<PendingJob> {
        info!("Processing {} with {}", handle, settings);
        self.pool.submit(buffer, settings)
    }
}

/// Check the request fields before any file is touched
///
/// # Errors
/// * `MissingField` - if the handle is blank or the settings are absent
/// * `InvalidSettings` - if a setting is out of range
fn required_settings(request: &ProcessRequest) -> Result<LofiSettings> {
    let settings = match request.settings {
        Some(settings) if !request.audio_url.trim().is_empty() => settings,
        Some(_) => return Err(LofiError::missing("audioUrl", PROCESS_FIELDS_REQUIRED)),
        None => return Err(LofiError::missing("settings", PROCESS_FIELDS_REQUIRED)),
    };
    settings.validate()?;
    Ok(settings)
}

fn processed_response(stored: StoredAudio) -> ProcessResponse {
    ProcessResponse {
        processed_audio_url: stored.handle,
        message: PROCESSED_MESSAGE.to_string(),
    }
}

/// Run file work on the blocking thread pool
async fn off_runtime<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| LofiError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
}
