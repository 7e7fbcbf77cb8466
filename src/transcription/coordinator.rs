//! # Transcription Coordinator
//!
//! Drives one transcription request end to end: validate the upload, resolve
//! a per-request model override, normalize the audio, run inference on a pool
//! slot, and assemble the structured result. The coordinator also owns
//! graceful shutdown: it stops admitting work, waits for the active-request
//! count to reach zero, unloads the model, and drains the pool.
//!
//! Collaborators (validator, preprocessor, engine, model manager, pool) are
//! injected at construction, so every path here is testable with fakes.

use crate::audio::{temp, AudioPreprocessor, AudioValidator};
use crate::error::{ServiceError, ServiceResult};
use crate::transcription::engine::{InferenceEngine, InferenceOptions, TaskKind};
use crate::transcription::manager::ModelManager;
use crate::transcription::model::{ModelHandle, ModelSize, SUPPORTED_LANGUAGES};
use crate::transcription::result::{self, TranscriptionResult};
use crate::workpool::WorkPool;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// How often the drain loop re-checks the active-request count.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One transcription request.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub audio_path: PathBuf,
    /// Model to use for this request; `None` uses whichever is loaded.
    pub model_size: Option<ModelSize>,
    /// Language hint (ISO 639-1); `None` lets the engine detect it.
    pub language: Option<String>,
    pub temperature: f32,
    pub task: TaskKind,
}

impl TranscriptionJob {
    pub fn new(audio_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            model_size: None,
            language: None,
            temperature: 0.0,
            task: TaskKind::Transcribe,
        }
    }

    pub fn with_model(mut self, size: ModelSize) -> Self {
        self.model_size = Some(size);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_task(mut self, task: TaskKind) -> Self {
        self.task = task;
        self
    }

    /// Parameter validation, before any model or file work.
    fn validate(&self) -> ServiceResult<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ServiceError::InvalidRequest(format!(
                "Temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }
        if let Some(lang) = &self.language {
            if !SUPPORTED_LANGUAGES.contains(&lang.as_str()) {
                return Err(ServiceError::InvalidRequest(format!(
                    "Unsupported language hint: {}",
                    lang
                )));
            }
        }
        Ok(())
    }
}

/// Running totals exposed for health reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorStats {
    pub completed_requests: u64,
    pub failed_requests: u64,
    pub total_processing_seconds: f64,
    /// Source-audio seconds successfully transcribed.
    pub total_audio_seconds: f64,
    confidence_sum: f64,
    confidence_samples: u64,
}

impl CoordinatorStats {
    pub fn average_processing_seconds(&self) -> f64 {
        if self.completed_requests == 0 {
            0.0
        } else {
            result::round3(self.total_processing_seconds / self.completed_requests as f64)
        }
    }

    /// Rolling average of the overall confidence scores, over the requests
    /// whose engine reported log-probabilities.
    pub fn average_confidence(&self) -> Option<f32> {
        if self.confidence_samples == 0 {
            None
        } else {
            Some((self.confidence_sum / self.confidence_samples as f64) as f32)
        }
    }
}

/// Decrements the active-request count when a request leaves the coordinator,
/// on success and on every failure path past admission.
struct ActiveRequestGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveRequestGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self {
            active: Arc::clone(active),
        }
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Orchestrates transcription requests against the shared model and pool.
pub struct TranscriptionCoordinator {
    manager: Arc<ModelManager>,
    pool: Arc<WorkPool>,
    validator: Arc<dyn AudioValidator>,
    preprocessor: Arc<dyn AudioPreprocessor>,
    engine: Arc<dyn InferenceEngine>,
    cleanup_temp_files: bool,
    target_sample_rate: u32,
    active: Arc<AtomicUsize>,
    draining: AtomicBool,
    stats: RwLock<CoordinatorStats>,
}

impl TranscriptionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        manager: Arc<ModelManager>,
        pool: Arc<WorkPool>,
        validator: Arc<dyn AudioValidator>,
        preprocessor: Arc<dyn AudioPreprocessor>,
        engine: Arc<dyn InferenceEngine>,
        cleanup_temp_files: bool,
        target_sample_rate: u32,
    ) -> Self {
        Self {
            manager,
            pool,
            validator,
            preprocessor,
            engine,
            cleanup_temp_files,
            target_sample_rate,
            active: Arc::new(AtomicUsize::new(0)),
            draining: AtomicBool::new(false),
            stats: RwLock::new(CoordinatorStats::default()),
        }
    }

    /// Requests currently between admission and completion.
    pub fn active_requests(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Snapshot of the running totals.
    pub async fn stats(&self) -> CoordinatorStats {
        self.stats.read().await.clone()
    }

    /// Run one transcription request to completion.
    pub async fn transcribe(&self, job: TranscriptionJob) -> ServiceResult<TranscriptionResult> {
        if self.draining.load(Ordering::SeqCst) {
            return Err(ServiceError::ShuttingDown);
        }
        job.validate()?;

        // A per-request model override loads before admission; the request is
        // not yet active, so a failed load leaves the counter untouched.
        if let Some(requested) = job.model_size {
            if self.manager.loaded_size().await != Some(requested) {
                self.manager.load(requested).await?;
            }
        }

        // Resolve the handle before counting the request as active, so a
        // missing model never perturbs the drain signal.
        let model = self.manager.current_model().await?;
        let _guard = ActiveRequestGuard::enter(&self.active);

        let started = Instant::now();
        let outcome = self.execute(&job, model).await;
        let elapsed = started.elapsed();

        let mut stats = self.stats.write().await;
        match &outcome {
            Ok(result) => {
                stats.completed_requests += 1;
                stats.total_processing_seconds += elapsed.as_secs_f64();
                stats.total_audio_seconds += result.duration;
                if let Some(confidence) = result.confidence_score {
                    stats.confidence_sum += confidence as f64;
                    stats.confidence_samples += 1;
                }
                info!(
                    path = %job.audio_path.display(),
                    model = %result.model_used,
                    elapsed_s = format!("{:.2}", elapsed.as_secs_f64()),
                    segments = result.segments.len(),
                    "transcription completed"
                );
            }
            Err(err) => {
                stats.failed_requests += 1;
                error!(
                    path = %job.audio_path.display(),
                    error = %err,
                    code = err.code(),
                    "transcription failed"
                );
            }
        }

        outcome
    }

    async fn execute(
        &self,
        job: &TranscriptionJob,
        model: Arc<ModelHandle>,
    ) -> ServiceResult<TranscriptionResult> {
        let started = Instant::now();
        let info = self.validator.validate(&job.audio_path)?;

        let normalized = {
            let preprocessor = Arc::clone(&self.preprocessor);
            let input = job.audio_path.clone();
            let rate = self.target_sample_rate;
            self.pool
                .submit("preprocess", move || preprocessor.preprocess(&input, rate))
                .await??
        };

        let options = InferenceOptions {
            language: job.language.clone(),
            temperature: job.temperature,
            task: job.task,
        };

        let inference = {
            let engine = Arc::clone(&self.engine);
            let model = Arc::clone(&model);
            let audio = normalized.clone();
            self.pool
                .submit("inference", move || engine.run(&model, &audio, &options))
                .await
        };

        if self.cleanup_temp_files {
            temp::cleanup_temp_file(&normalized);
        }

        let raw = inference?.map_err(|cause| ServiceError::TranscriptionFailed {
            path: job.audio_path.clone(),
            cause,
        })?;

        // Malformed engine output (e.g. inverted segment times) is an
        // inference-side failure, not a client error.
        result::assemble(raw, info.duration_seconds, started.elapsed(), model.size()).map_err(
            |err| ServiceError::TranscriptionFailed {
                path: job.audio_path.clone(),
                cause: anyhow::Error::new(err),
            },
        )
    }

    /// Wait until every admitted request has completed.
    ///
    /// Polling is deliberate: the counter is the single source of truth and a
    /// bounded poll is simpler than threading a notification channel through
    /// every exit path. Shutdown latency is at most one interval.
    pub async fn drain(&self) {
        loop {
            let active = self.active_requests();
            if active == 0 {
                return;
            }
            info!(active, "waiting for active transcriptions to finish");
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Graceful shutdown: refuse new work, drain, release the model, then
    /// stop the pool.
    pub async fn shutdown(&self) {
        self.draining.store(true, Ordering::SeqCst);
        self.manager.begin_shutdown();
        info!("coordinator shutting down");
        self.drain().await;
        if let Err(err) = self.manager.unload().await {
            warn!(error = %err, "model unload during shutdown failed");
        }
        self.pool.shutdown().await;
        info!("coordinator shut down");
    }
}
