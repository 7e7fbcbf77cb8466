//! # Inference Contract
//!
//! The trait through which the opaque speech-recognition backend is invoked,
//! plus the option set and raw output types it produces. Implementations are
//! blocking and CPU/GPU-bound; the coordinator always dispatches them through
//! the work pool.

use crate::error::ServiceError;
use crate::transcription::model::ModelHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// What the engine should do with the audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Transcribe in the spoken language.
    #[default]
    Transcribe,
    /// Translate to English while transcribing.
    Translate,
}

impl std::str::FromStr for TaskKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transcribe" => Ok(TaskKind::Transcribe),
            "translate" => Ok(TaskKind::Translate),
            _ => Err(ServiceError::InvalidRequest(format!(
                "Unknown task kind: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Transcribe => write!(f, "transcribe"),
            TaskKind::Translate => write!(f, "translate"),
        }
    }
}

/// Per-request options forwarded to the engine.
#[derive(Debug, Clone)]
pub struct InferenceOptions {
    /// Language hint (ISO 639-1); `None` lets the engine detect it.
    pub language: Option<String>,
    /// Sampling temperature, 0.0 (deterministic) to 1.0.
    pub temperature: f32,
    pub task: TaskKind,
}

/// One segment as emitted by the engine, before assembly.
#[derive(Debug, Clone)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Average log-probability of the segment's tokens, if the backend
    /// reports one.
    pub avg_logprob: Option<f32>,
}

/// Raw engine output for one audio file.
#[derive(Debug, Clone, Default)]
pub struct RawTranscription {
    pub text: String,
    pub language: Option<String>,
    pub segments: Vec<RawSegment>,
}

/// Collaborator that runs inference against a resident model.
///
/// The handle is borrowed immutably: inference never mutates the model, which
/// is what makes sharing one handle across concurrent requests sound.
pub trait InferenceEngine: Send + Sync {
    fn run(
        &self,
        model: &ModelHandle,
        audio_path: &Path,
        options: &InferenceOptions,
    ) -> anyhow::Result<RawTranscription>;
}
