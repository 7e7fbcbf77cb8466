//! # Model Types and Loader Contract
//!
//! Model identity (`ModelSize`), the opaque handle to a resident model
//! (`ModelHandle`), and the collaborator traits through which the actual
//! speech-recognition backend is reached. The core never inspects model
//! internals; it owns the handle's lifecycle and hands out shared references
//! while a model is loaded.

use crate::error::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Available model sizes with their characteristics.
///
/// Larger models are more accurate but slower and hungrier for memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// Every supported size, smallest first.
    pub const ALL: [ModelSize; 5] = [
        ModelSize::Tiny,
        ModelSize::Base,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
    ];

    /// Approximate on-disk model size in MB.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "Fastest, least accurate",
            ModelSize::Base => "Good balance of speed and accuracy",
            ModelSize::Small => "Better accuracy, slower",
            ModelSize::Medium => "Good accuracy, slower",
            ModelSize::Large => "Best accuracy, slowest",
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(ServiceError::InvalidRequest(format!(
                "Unknown model size: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// Compute device preference passed through to the model loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Let the loader pick the best available device.
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(ServiceError::InvalidRequest(format!(
                "Unknown device preference: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DevicePreference::Auto => "auto",
            DevicePreference::Cpu => "cpu",
            DevicePreference::Cuda => "cuda",
            DevicePreference::Metal => "metal",
        };
        write!(f, "{}", name)
    }
}

/// Backend-specific state of a loaded model. The inference engine downcasts
/// this to its concrete type; the core treats it as opaque.
pub trait SpeechModel: Send + Sync {
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

/// Collaborator that performs the blocking, resource-heavy model load.
/// Executed on a work-pool slot, never on the async coordination layer.
pub trait ModelLoader: Send + Sync {
    fn load(
        &self,
        size: ModelSize,
        device: DevicePreference,
    ) -> anyhow::Result<Box<dyn SpeechModel>>;
}

/// Handle to a resident model, owned by the model manager and shared with
/// in-flight requests as `Arc<ModelHandle>`.
///
/// Replacement semantics are copy-on-replace: loading a new model swaps the
/// manager's `Arc` but never invalidates handles already handed out; the old
/// model is released when its last holder drops.
pub struct ModelHandle {
    size: ModelSize,
    loaded_at: DateTime<Utc>,
    model: Box<dyn SpeechModel>,
}

impl ModelHandle {
    pub fn new(size: ModelSize, model: Box<dyn SpeechModel>) -> Self {
        Self {
            size,
            loaded_at: Utc::now(),
            model,
        }
    }

    pub fn size(&self) -> ModelSize {
        self.size
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Backend state for the inference engine.
    pub fn model(&self) -> &dyn SpeechModel {
        self.model.as_ref()
    }

    /// Convenience downcast for engines that know their concrete model type.
    pub fn downcast_model<T: 'static>(&self) -> Option<&T> {
        self.model.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("size", &self.size)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Outcome of a load request, including the idempotent already-loaded path.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub model_size: ModelSize,
    pub load_time_seconds: f64,
    pub already_loaded: bool,
    pub message: String,
}

/// Languages the recognition backend accepts as hints (ISO 639-1, plus a few
/// regional codes the upstream models use).
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv",
    "it", "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no",
    "th", "ur", "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr",
    "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq", "sw",
    "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd", "gu",
    "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl",
    "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_round_trip() {
        for size in ModelSize::ALL {
            let parsed: ModelSize = size.to_string().parse().unwrap();
            assert_eq!(parsed, size);
        }
        assert!("enormous".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_device_preference_aliases() {
        assert_eq!("gpu".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!(DevicePreference::default(), DevicePreference::Auto);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ModelSize::Base).unwrap();
        assert_eq!(json, "\"base\"");
        let back: ModelSize = serde_json::from_str("\"large\"").unwrap();
        assert_eq!(back, ModelSize::Large);
    }
}
