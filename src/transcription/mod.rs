//! # Transcription Core
//!
//! Model lifecycle and request orchestration:
//!
//! - **model**: model identity, the opaque handle, and the loader contract
//! - **manager**: the single-resident-model state machine
//! - **engine**: the inference collaborator contract and its raw output
//! - **coordinator**: end-to-end request flow and graceful shutdown
//! - **result**: assembly of raw engine output into the structured response

pub mod coordinator;
pub mod engine;
pub mod manager;
pub mod model;
pub mod result;

pub use coordinator::{CoordinatorStats, TranscriptionCoordinator, TranscriptionJob};
pub use engine::{InferenceEngine, InferenceOptions, RawSegment, RawTranscription, TaskKind};
pub use manager::{CurrentModelInfo, ManagerStatus, ModelManager, ModelState};
pub use model::{
    DevicePreference, LoadReport, ModelHandle, ModelLoader, ModelSize, SpeechModel,
    SUPPORTED_LANGUAGES,
};
pub use result::{assemble, Segment, TranscriptionResult};
