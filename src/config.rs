//! # Configuration Management
//!
//! Layered configuration for the transcription service, loaded in priority
//! order: built-in defaults, then an optional `config.toml`, then environment
//! variables prefixed with `WHISPERRR__` (double underscore separates nested
//! keys, e.g. `WHISPERRR__PROCESSING__MAX_CONCURRENT_TRANSCRIPTIONS=5`).
//!
//! Values are validated after loading so the service never starts with a
//! zero-capacity pool or an unusable size ceiling.

use crate::transcription::model::{DevicePreference, ModelSize};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub model: ModelConfig,
    pub limits: LimitsConfig,
    pub processing: ProcessingConfig,
    pub audio: AudioConfig,
}

/// Model selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model size loaded when a request does not override it.
    pub default_size: ModelSize,
    /// Compute device preference passed to the model loader.
    pub device: DevicePreference,
}

/// Input size ceilings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted audio file size in megabytes (1..=1000).
    pub max_file_size_mb: u64,
}

/// Request processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Capacity of the blocking work pool; bounds simultaneous inference.
    pub max_concurrent_transcriptions: usize,
    /// Advisory timeout for a single request, surfaced to the request layer.
    pub request_timeout_seconds: u64,
    /// Remove normalized temp files after each request.
    pub cleanup_temp_files: bool,
    /// Directory for normalized audio temp files.
    pub upload_dir: PathBuf,
}

/// Audio acceptance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Accepted container formats (lowercase extensions).
    pub supported_formats: Vec<String>,
    /// Sample rate normalized audio is resampled to before inference.
    pub target_sample_rate: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                default_size: ModelSize::Base,
                device: DevicePreference::Auto,
            },
            limits: LimitsConfig {
                max_file_size_mb: 25,
            },
            processing: ProcessingConfig {
                max_concurrent_transcriptions: 3,
                request_timeout_seconds: 300,
                cleanup_temp_files: true,
                upload_dir: std::env::temp_dir().join("whisperrr_uploads"),
            },
            audio: AudioConfig {
                supported_formats: ["mp3", "wav", "m4a", "flac", "ogg", "wma"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                target_sample_rate: 16_000,
            },
        }
    }
}

impl ServiceConfig {
    /// Load configuration from defaults, `config.toml`, and the environment.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&ServiceConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("WHISPERRR").separator("__"));

        let config: ServiceConfig = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Check that the loaded values can actually run the service.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_file_size_mb == 0 || self.limits.max_file_size_mb > 1000 {
            return Err(anyhow::anyhow!(
                "Max file size must be between 1 and 1000 MB"
            ));
        }

        if self.processing.max_concurrent_transcriptions == 0 {
            return Err(anyhow::anyhow!(
                "Max concurrent transcriptions must be greater than 0"
            ));
        }

        if self.audio.supported_formats.is_empty() {
            return Err(anyhow::anyhow!(
                "At least one supported audio format is required"
            ));
        }

        if self.audio.target_sample_rate == 0 {
            return Err(anyhow::anyhow!("Target sample rate must be greater than 0"));
        }

        Ok(())
    }

    /// Maximum accepted file size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.limits.max_file_size_mb * 1024 * 1024
    }

    /// Apply a partial update from a JSON document, validating the result.
    ///
    /// Only the fields present in the JSON are touched, so callers can send
    /// e.g. `{"processing": {"cleanup_temp_files": false}}` on its own.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(model) = partial.get("model") {
            if let Some(size) = model.get("default_size").and_then(|v| v.as_str()) {
                self.model.default_size = size.parse().map_err(anyhow::Error::new)?;
            }
            if let Some(device) = model.get("device").and_then(|v| v.as_str()) {
                self.model.device = device.parse().map_err(anyhow::Error::new)?;
            }
        }

        if let Some(limits) = partial.get("limits") {
            if let Some(mb) = limits.get("max_file_size_mb").and_then(|v| v.as_u64()) {
                self.limits.max_file_size_mb = mb;
            }
        }

        if let Some(processing) = partial.get("processing") {
            if let Some(n) = processing
                .get("max_concurrent_transcriptions")
                .and_then(|v| v.as_u64())
            {
                self.processing.max_concurrent_transcriptions = n as usize;
            }
            if let Some(cleanup) = processing
                .get("cleanup_temp_files")
                .and_then(|v| v.as_bool())
            {
                self.processing.cleanup_temp_files = cleanup;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.model.default_size, ModelSize::Base);
        assert_eq!(config.processing.max_concurrent_transcriptions, 3);
        assert_eq!(config.max_file_size_bytes(), 25 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServiceConfig::default();
        config.processing.max_concurrent_transcriptions = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.limits.max_file_size_mb = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = ServiceConfig::default();
        let json = r#"{"model": {"default_size": "small"}, "processing": {"cleanup_temp_files": false}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.model.default_size, ModelSize::Small);
        assert!(!config.processing.cleanup_temp_files);
        // Untouched fields keep their defaults
        assert_eq!(config.limits.max_file_size_mb, 25);
    }

    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = ServiceConfig::default();
        let json = r#"{"processing": {"max_concurrent_transcriptions": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
