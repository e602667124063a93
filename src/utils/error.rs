//! Error types and handling
//!
//! Common error types used across the application.

use crate::export::types::ExportError;
use crate::recorder::channel::RecordingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Error response for callers of the command layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

fn recording_code(error: &RecordingError) -> &'static str {
    match error {
        RecordingError::AlreadyRunning => "ALREADY_RUNNING",
        RecordingError::NotRunning => "NOT_RUNNING",
        RecordingError::CaptureUnavailable(_) => "CAPTURE_UNAVAILABLE",
        RecordingError::DeviceUnavailable { .. } => "DEVICE_UNAVAILABLE",
        RecordingError::EncodingFailed(_) => "ENCODING_FAILED",
        RecordingError::SessionStartFailed(_) => "SESSION_START_FAILED",
        RecordingError::InvalidConfig(_) => "INVALID_CONFIG",
        RecordingError::Io(_) => "IO_ERROR",
    }
}

impl From<RecordingError> for ErrorResponse {
    fn from(error: RecordingError) -> Self {
        ErrorResponse {
            code: recording_code(&error).to_string(),
            message: error.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "INVALID_CONFIG",
            AppError::Recording(e) => recording_code(e),
            AppError::Export(_) => "ENCODING_FAILED",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_codes() {
        let response = ErrorResponse::from(RecordingError::AlreadyRunning);
        assert_eq!(response.code, "ALREADY_RUNNING");
        assert_eq!(response.message, "A recording is already in progress");

        let response = ErrorResponse::from(AppError::from(RecordingError::SessionStartFailed(
            "no display".to_string(),
        )));
        assert_eq!(response.code, "SESSION_START_FAILED");
    }

    #[test]
    fn test_export_maps_to_encoding_failed() {
        let response = ErrorResponse::from(AppError::from(ExportError::NoFrames));
        assert_eq!(response.code, "ENCODING_FAILED");
    }
}
