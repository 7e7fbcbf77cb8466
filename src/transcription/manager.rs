//! # Model Manager
//!
//! Owns the single resident model and its lifecycle state machine:
//!
//! ```text
//! Unloaded -> Loading -> Loaded -> Unloading -> Unloaded
//! ```
//!
//! Exactly one load proceeds at a time — the `Loading` state is the mutual
//! exclusion gate, checked and set under the same lock before any blocking
//! work starts. A concurrent load fails fast with `ModelBusy` rather than
//! queueing. Loading the size that is already resident is an idempotent
//! no-op. On load failure the manager reverts to `Unloaded` so the next
//! attempt starts clean.
//!
//! The handle is replaced, never mutated in place: `current_model()` hands out
//! an `Arc` clone that stays valid for the duration of that caller's use even
//! if a new load swaps the manager's own reference concurrently.

use crate::error::{ServiceError, ServiceResult};
use crate::transcription::model::{
    DevicePreference, LoadReport, ModelHandle, ModelLoader, ModelSize, SUPPORTED_LANGUAGES,
};
use crate::transcription::result::round3;
use crate::workpool::WorkPool;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Lifecycle state of the managed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
}

/// State guarded by one lock so transitions are atomic.
///
/// Invariant: `handle.is_some()` iff `state == Loaded`.
struct ManagerInner {
    state: ModelState,
    handle: Option<Arc<ModelHandle>>,
    last_loaded_at: Option<DateTime<Utc>>,
}

/// Owner of the resident model. Constructed explicitly at startup and
/// injected into the coordinator; there is no ambient global instance.
pub struct ModelManager {
    inner: RwLock<ManagerInner>,
    loader: Arc<dyn ModelLoader>,
    pool: Arc<WorkPool>,
    device: DevicePreference,
    started_at: Instant,
    shutting_down: AtomicBool,
}

/// Snapshot for health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub loaded: bool,
    pub model_size: Option<ModelSize>,
    pub uptime_seconds: f64,
}

/// Detailed model information for the request layer.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentModelInfo {
    pub model_size: Option<ModelSize>,
    pub is_loaded: bool,
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub supported_languages: &'static [&'static str],
}

impl ModelManager {
    pub fn new(
        loader: Arc<dyn ModelLoader>,
        pool: Arc<WorkPool>,
        device: DevicePreference,
    ) -> Self {
        Self {
            inner: RwLock::new(ManagerInner {
                state: ModelState::Unloaded,
                handle: None,
                last_loaded_at: None,
            }),
            loader,
            pool,
            device,
            started_at: Instant::now(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Refuse all further load requests. Called by the coordinator at the
    /// start of shutdown, before draining, so a load arriving mid-drain
    /// cannot commit a model after the final unload.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ModelState {
        self.inner.read().await.state
    }

    /// Size of the resident model, if one is loaded.
    pub async fn loaded_size(&self) -> Option<ModelSize> {
        let inner = self.inner.read().await;
        inner.handle.as_ref().map(|h| h.size())
    }

    /// Load a model, replacing any resident one on success.
    ///
    /// Returns the already-loaded report without doing any work when the
    /// requested size is resident; fails with `ModelBusy` when another load
    /// holds the gate and with `ShuttingDown` once shutdown has begun.
    pub async fn load(&self, size: ModelSize) -> ServiceResult<LoadReport> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(ServiceError::ShuttingDown);
        }
        {
            let mut inner = self.inner.write().await;
            match inner.state {
                ModelState::Loading => {
                    return Err(ServiceError::ModelBusy {
                        requested: Some(size),
                    })
                }
                ModelState::Unloading => return Err(ServiceError::ShuttingDown),
                ModelState::Loaded
                    if inner.handle.as_ref().map(|h| h.size()) == Some(size) =>
                {
                    return Ok(LoadReport {
                        model_size: size,
                        load_time_seconds: 0.0,
                        already_loaded: true,
                        message: format!("Model {} already loaded", size),
                    });
                }
                // Unloaded, or Loaded with a different size: take the gate.
                // The old handle is detached now; in-flight requests keep
                // their own Arc clones until they finish.
                _ => {
                    inner.state = ModelState::Loading;
                    inner.handle = None;
                }
            }
        }

        info!(model = %size, device = %self.device, "loading model");
        let start = Instant::now();
        let loader = Arc::clone(&self.loader);
        let device = self.device;
        let outcome = self
            .pool
            .submit("model-load", move || loader.load(size, device))
            .await;

        let mut inner = self.inner.write().await;
        match outcome {
            Ok(Ok(model)) => {
                inner.state = ModelState::Loaded;
                inner.handle = Some(Arc::new(ModelHandle::new(size, model)));
                inner.last_loaded_at = Some(Utc::now());
                let elapsed = start.elapsed().as_secs_f64();
                info!(model = %size, elapsed_s = format!("{:.2}", elapsed), "model loaded");
                Ok(LoadReport {
                    model_size: size,
                    load_time_seconds: round3(elapsed),
                    already_loaded: false,
                    message: format!("Model {} loaded successfully", size),
                })
            }
            Ok(Err(cause)) => {
                inner.state = ModelState::Unloaded;
                inner.handle = None;
                error!(model = %size, error = %cause, "model load failed");
                Err(ServiceError::ModelLoadFailed {
                    model_size: size,
                    cause,
                })
            }
            Err(pool_err) => {
                inner.state = ModelState::Unloaded;
                inner.handle = None;
                error!(model = %size, error = %pool_err, "model load could not be dispatched");
                Err(pool_err)
            }
        }
    }

    /// Shared reference to the resident model, valid for the caller's whole
    /// use even if a reload replaces the manager's own reference meanwhile.
    pub async fn current_model(&self) -> ServiceResult<Arc<ModelHandle>> {
        let inner = self.inner.read().await;
        match (&inner.state, &inner.handle) {
            (ModelState::Loaded, Some(handle)) => Ok(Arc::clone(handle)),
            _ => Err(ServiceError::ModelNotLoaded),
        }
    }

    /// Release the resident model. Callers are expected to have drained
    /// dependent requests first (the coordinator does this during shutdown);
    /// any stragglers still holding an `Arc` keep the model alive until they
    /// finish, so release is safe either way.
    pub async fn unload(&self) -> ServiceResult<()> {
        let mut inner = self.inner.write().await;
        match inner.state {
            ModelState::Loading => Err(ServiceError::ModelBusy { requested: None }),
            ModelState::Unloaded | ModelState::Unloading => Ok(()),
            ModelState::Loaded => {
                let size = inner.handle.as_ref().map(|h| h.size());
                // The whole release happens under one write-lock hold, so
                // Unloading is never visible to readers; the assignment keeps
                // the transition sequence explicit.
                inner.state = ModelState::Unloading;
                inner.handle = None;
                inner.state = ModelState::Unloaded;
                info!(model = ?size, "model unloaded");
                Ok(())
            }
        }
    }

    /// Health snapshot.
    pub async fn status(&self) -> ManagerStatus {
        let inner = self.inner.read().await;
        ManagerStatus {
            loaded: inner.state == ModelState::Loaded,
            model_size: inner.handle.as_ref().map(|h| h.size()),
            uptime_seconds: round3(self.started_at.elapsed().as_secs_f64()),
        }
    }

    /// Detailed model information.
    pub async fn current_model_info(&self) -> CurrentModelInfo {
        let inner = self.inner.read().await;
        CurrentModelInfo {
            model_size: inner.handle.as_ref().map(|h| h.size()),
            is_loaded: inner.state == ModelState::Loaded,
            last_loaded_at: inner.last_loaded_at,
            supported_languages: SUPPORTED_LANGUAGES,
        }
    }
}
