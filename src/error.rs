//! # Error Handling
//!
//! Service-wide error taxonomy. Every failure class the core can surface has a
//! dedicated variant carrying the context a caller needs (requested model size,
//! offending path, the underlying cause), a stable machine-readable code, and a
//! client/server classification the request layer can map onto status codes.
//!
//! Causes from external collaborators (model loader, inference engine) arrive
//! as `anyhow::Error` and are carried inside the matching variant rather than
//! flattened to strings, so the full chain stays available for logging.

use crate::transcription::model::ModelSize;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// All errors surfaced by the transcription core.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Audio input is in an unsupported format.
    #[error("invalid or unsupported audio format: {provided}")]
    InvalidFormat {
        provided: String,
        supported: Vec<String>,
    },

    /// Audio file exceeds the configured size ceiling.
    #[error("file size {size_bytes} bytes exceeds maximum of {max_bytes} bytes")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },

    /// Inference was requested while no model is resident.
    #[error("no model is currently loaded")]
    ModelNotLoaded,

    /// A load was attempted while another load is in progress. Concurrent
    /// loads fail fast instead of queueing; callers should retry later.
    #[error("a model load is already in progress")]
    ModelBusy { requested: Option<ModelSize> },

    /// The model loader collaborator failed.
    #[error("failed to load model {model_size}: {cause}")]
    ModelLoadFailed {
        model_size: ModelSize,
        cause: anyhow::Error,
    },

    /// The inference engine failed; carries the input reference.
    #[error("transcription failed for {}: {cause}", .path.display())]
    TranscriptionFailed { path: PathBuf, cause: anyhow::Error },

    /// Audio preprocessing or decoding failed at a specific step.
    #[error("audio processing failed during {step}: {cause}")]
    AudioProcessing {
        step: &'static str,
        cause: anyhow::Error,
    },

    /// Temp-file or other filesystem operation failed.
    #[error("file system operation '{operation}' failed for {}: {source}", .path.display())]
    FileSystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Request parameters failed validation before any work started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A segment violated the `end_time > start_time` invariant.
    #[error("segment end time {end_time} must be after start time {start_time}")]
    InvalidSegment { start_time: f64, end_time: f64 },

    /// New work was refused because the service is draining.
    #[error("service is shutting down")]
    ShuttingDown,

    /// Unexpected internal failure (e.g. a panicked worker task).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable error code for API responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidFormat { .. } => "INVALID_AUDIO_FORMAT",
            ServiceError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            ServiceError::ModelNotLoaded => "MODEL_NOT_LOADED",
            ServiceError::ModelBusy { .. } => "MODEL_BUSY",
            ServiceError::ModelLoadFailed { .. } => "MODEL_LOAD_FAILED",
            ServiceError::TranscriptionFailed { .. } => "TRANSCRIPTION_FAILED",
            ServiceError::AudioProcessing { .. } => "AUDIO_PROCESSING_ERROR",
            ServiceError::FileSystem { .. } => "FILE_SYSTEM_ERROR",
            ServiceError::InvalidRequest(_) => "INVALID_REQUEST",
            ServiceError::InvalidSegment { .. } => "INVALID_SEGMENT",
            ServiceError::ShuttingDown => "SHUTTING_DOWN",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is attributable to the caller's input.
    ///
    /// `ModelBusy` counts as a client-class error: the request was fine but
    /// should be retried later (conflict), not treated as a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidFormat { .. }
                | ServiceError::FileTooLarge { .. }
                | ServiceError::ModelBusy { .. }
                | ServiceError::InvalidRequest(_)
        )
    }

    /// Render the error as the JSON body the request layer returns to clients.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "type": self.code(),
                "message": self.to_string(),
                "details": self.details(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        })
    }

    /// Structured detail fields per variant.
    fn details(&self) -> serde_json::Value {
        match self {
            ServiceError::InvalidFormat {
                provided,
                supported,
            } => json!({ "provided_format": provided, "supported_formats": supported }),
            ServiceError::FileTooLarge {
                size_bytes,
                max_bytes,
            } => json!({ "file_size_bytes": size_bytes, "max_size_bytes": max_bytes }),
            ServiceError::ModelBusy { requested } => {
                json!({ "requested_model": requested.map(|m| m.to_string()) })
            }
            ServiceError::ModelLoadFailed { model_size, cause } => {
                json!({ "model_size": model_size.to_string(), "original_error": cause.to_string() })
            }
            ServiceError::TranscriptionFailed { path, cause } => {
                json!({ "file_path": path.display().to_string(), "original_error": cause.to_string() })
            }
            ServiceError::AudioProcessing { step, cause } => {
                json!({ "processing_step": step, "original_error": cause.to_string() })
            }
            ServiceError::FileSystem {
                operation,
                path,
                source,
            } => json!({
                "operation": operation,
                "file_path": path.display().to_string(),
                "original_error": source.to_string(),
            }),
            ServiceError::InvalidSegment {
                start_time,
                end_time,
            } => json!({ "start_time": start_time, "end_time": end_time }),
            _ => serde_json::Value::Null,
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::InvalidRequest(format!("JSON parsing error: {}", err))
    }
}

/// Shorthand for results using the service error type.
pub type ServiceResult<T> = Result<T, ServiceError>;
