//! # whisperrr-core
//!
//! Model lifecycle and request coordination core for the whisperrr speech
//! transcription service. The crate owns everything between "a request layer
//! accepted an upload" and "a structured transcription result exists":
//!
//! - a bounded [`workpool::WorkPool`] that runs blocking model and inference
//!   work with backpressure instead of load shedding
//! - a [`transcription::ModelManager`] holding at most one resident model,
//!   with fail-fast concurrent loads and copy-on-replace handles
//! - a [`transcription::TranscriptionCoordinator`] driving each request
//!   through validation, normalization, inference and assembly
//! - [`audio`] validation and preprocessing for uploaded files
//!
//! The actual speech-recognition backend is reached through the
//! [`transcription::ModelLoader`] and [`transcription::InferenceEngine`]
//! traits; the core never links against it directly.
//!
//! ## Wiring it together
//!
//! ```no_run
//! use std::sync::Arc;
//! use whisperrr_core::audio::{FsAudioValidator, PcmWavPreprocessor};
//! use whisperrr_core::config::ServiceConfig;
//! use whisperrr_core::transcription::{ModelManager, TranscriptionCoordinator};
//! use whisperrr_core::workpool::WorkPool;
//!
//! # fn wiring(loader: Arc<dyn whisperrr_core::transcription::ModelLoader>,
//! #           engine: Arc<dyn whisperrr_core::transcription::InferenceEngine>)
//! #           -> anyhow::Result<()> {
//! let config = ServiceConfig::load()?;
//! config.validate()?;
//!
//! let pool = Arc::new(WorkPool::new(config.processing.max_concurrent_transcriptions));
//! let manager = Arc::new(ModelManager::new(loader, Arc::clone(&pool), config.model.device));
//! let coordinator = TranscriptionCoordinator::new(
//!     manager,
//!     pool,
//!     Arc::new(FsAudioValidator::from_config(&config)),
//!     Arc::new(PcmWavPreprocessor::new(config.processing.upload_dir.clone())),
//!     engine,
//!     config.processing.cleanup_temp_files,
//!     config.audio.target_sample_rate,
//! );
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod transcription;
pub mod workpool;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use transcription::{
    ModelManager, ModelSize, TranscriptionCoordinator, TranscriptionJob, TranscriptionResult,
};
pub use workpool::WorkPool;
