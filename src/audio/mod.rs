//! # Audio Handling
//!
//! Everything between "a path to an uploaded file" and "a normalized WAV the
//! inference engine can consume":
//!
//! - **probe**: container format detection from byte signatures
//! - **validator**: size, format and integrity checks before any heavy work
//! - **preprocessor**: decode, downmix, resample and re-encode to mono PCM
//! - **temp**: working-file creation and best-effort cleanup
//!
//! The validator and preprocessor are trait objects so the coordinator can be
//! tested without touching real audio files.

use crate::error::ServiceResult;
use std::path::Path;

pub mod preprocessor;
pub mod probe;
pub mod temp;
pub mod validator;

pub use preprocessor::PcmWavPreprocessor;
pub use probe::detect_audio_format;
pub use validator::FsAudioValidator;

/// Metadata gathered while validating an audio file.
///
/// Duration and sample rate are only available for containers the core can
/// parse itself (WAV); for everything else they are `None` and the result
/// falls back to the timing the inference backend reports.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFileInfo {
    /// Format detected from the file's byte signature (lowercase extension).
    pub detected_format: String,
    /// Duration in seconds, when the container was parsed.
    pub duration_seconds: Option<f64>,
    /// Sample rate in Hz, when the container was parsed.
    pub sample_rate: Option<u32>,
    pub file_size_bytes: u64,
}

/// Checks an uploaded file is acceptable before any slot is spent on it.
pub trait AudioValidator: Send + Sync {
    fn validate(&self, path: &Path) -> ServiceResult<AudioFileInfo>;
}

/// Converts accepted audio into the normalized form the engine expects,
/// returning the path of the produced temp file. Blocking; the coordinator
/// runs it on a work-pool slot.
pub trait AudioPreprocessor: Send + Sync {
    fn preprocess(&self, input: &Path, target_sample_rate: u32) -> ServiceResult<std::path::PathBuf>;
}
