//! Error handling for Lofi
//!
//! Every failure in the engine is a `LofiError`. Each variant maps to a
//! stable error code and an HTTP-equivalent status class so the request
//! façade can report it without exposing buffer internals.

use thiserror::Error;

/// Result type alias for Lofi operations
pub type Result<T> = std::result::Result<T, LofiError>;

/// Main error type for Lofi operations
#[derive(Error, Debug)]
pub enum LofiError {
    // Input Errors
    #[error("{message}")]
    MissingField { field: String, message: String },

    #[error("Invalid setting: {field} = {value} (expected {expected})")]
    InvalidSettings {
        field: String,
        value: i64,
        expected: String,
    },

    #[error("Unsupported buffer: {reason}")]
    UnsupportedBuffer { reason: String },

    #[error("Invalid source locator: {locator}")]
    InvalidLocator { locator: String },

    #[error("Invalid audio handle: {handle}")]
    InvalidHandle { handle: String },

    // Processing Errors
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailure { stage: String, reason: String },

    #[error("Processing cancelled")]
    Cancelled,

    // Resource Errors
    #[error("Resource exhausted: {details}")]
    ResourceExhausted { details: String },

    // Collaborator Errors
    #[error("Source unavailable: {locator} ({reason})")]
    SourceUnavailable { locator: String, reason: String },

    #[error("Audio not found: {handle}")]
    HandleNotFound { handle: String },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LofiError {
    /// Shorthand for a stage failure
    pub fn stage(stage: &str, reason: impl Into<String>) -> Self {
        LofiError::StageFailure {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an unsupported buffer
    pub fn unsupported_buffer(reason: impl Into<String>) -> Self {
        LofiError::UnsupportedBuffer {
            reason: reason.into(),
        }
    }

    /// Shorthand for a required request field that was absent or blank
    pub fn missing(field: &str, message: impl Into<String>) -> Self {
        LofiError::MissingField {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LofiError::MissingField { .. } => "MISSING_FIELD",
            LofiError::InvalidSettings { .. } => "INVALID_SETTINGS",
            LofiError::UnsupportedBuffer { .. } => "UNSUPPORTED_BUFFER",
            LofiError::InvalidLocator { .. } => "INVALID_LOCATOR",
            LofiError::InvalidHandle { .. } => "INVALID_HANDLE",
            LofiError::StageFailure { .. } => "STAGE_FAILURE",
            LofiError::Cancelled => "CANCELLED",
            LofiError::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
            LofiError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            LofiError::HandleNotFound { .. } => "HANDLE_NOT_FOUND",
            LofiError::InvalidAudio { .. } => "INVALID_AUDIO",
            LofiError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LofiError::Config { .. } => "CONFIG_ERROR",
            LofiError::Io(_) => "IO_ERROR",
            LofiError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// HTTP-equivalent status code
    ///
    /// 400 for malformed input, 404 for unknown handles, 503 when the
    /// worker queue is full, 500 for everything that failed while processing.
    pub fn status_code(&self) -> u16 {
        match self {
            LofiError::MissingField { .. }
            | LofiError::InvalidSettings { .. }
            | LofiError::UnsupportedBuffer { .. }
            | LofiError::InvalidLocator { .. }
            | LofiError::InvalidHandle { .. }
            | LofiError::Serialization(_) => 400,
            LofiError::HandleNotFound { .. } => 404,
            LofiError::ResourceExhausted { .. } => 503,
            _ => 500,
        }
    }

    /// Whether the error was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns a suggested recovery action for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            LofiError::MissingField { .. } => "Fill in every required request field",
            LofiError::InvalidSettings { .. } => {
                "Use tempo 60-100 and reverb/filter/noise/bitcrusher 0-100"
            }
            LofiError::UnsupportedBuffer { .. } => {
                "Provide non-empty audio with a positive sample rate"
            }
            LofiError::InvalidLocator { .. } => {
                "Use a youtube.com/watch?v= or youtu.be/ link, or a path to a .wav file"
            }
            LofiError::InvalidHandle { .. } => "Use the audioUrl returned by extract",
            LofiError::HandleNotFound { .. } => "Extract the audio again",
            LofiError::ResourceExhausted { .. } => "The server is busy, try again shortly",
            LofiError::SourceUnavailable { .. } => "Check that the source exists",
            LofiError::UnsupportedFormat { .. } => "Convert the file to PCM WAV first",
            _ => "Check the error details and try again",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LofiError::stage("lowpass", "unstable coefficients");
        assert_eq!(err.error_code(), "STAGE_FAILURE");
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("lowpass"));
    }

    #[test]
    fn test_status_classes() {
        let bad_input = LofiError::InvalidLocator {
            locator: "ftp://nowhere".to_string(),
        };
        assert_eq!(bad_input.status_code(), 400);
        assert!(bad_input.is_client_error());

        let busy = LofiError::ResourceExhausted {
            details: "queue full".to_string(),
        };
        assert_eq!(busy.status_code(), 503);
        assert!(!busy.is_client_error());

        assert_eq!(LofiError::Cancelled.status_code(), 500);
    }

    #[test]
    fn test_missing_field_renders_its_message() {
        let err = LofiError::missing("settings", "Audio URL and settings are required");
        assert_eq!(err.to_string(), "Audio URL and settings are required");
        assert_eq!(err.error_code(), "MISSING_FIELD");
        assert_eq!(err.status_code(), 400);
        assert!(matches!(err, LofiError::MissingField { ref field, .. } if field == "settings"));
    }

    #[test]
    fn test_recovery_hints() {
        let err = LofiError::unsupported_buffer("zero sample rate");
        assert!(!err.recovery_hint().is_empty());
        assert_eq!(err.status_code(), 400);
    }
}
