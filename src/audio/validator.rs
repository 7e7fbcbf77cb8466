//! # Upload Validation
//!
//! Cheap checks an uploaded file must pass before it is allowed to consume a
//! work-pool slot, in cost order: the file exists, it fits the size ceiling,
//! its byte signature matches an accepted format, and (for WAV) its content
//! looks like real audio rather than a corrupt or silent stream.

use crate::audio::probe::{detect_audio_format, wav_info};
use crate::audio::{AudioFileInfo, AudioValidator};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use std::path::Path;
use tracing::debug;

/// Minimum peak-to-peak amplitude over the sampled window for a 16-bit
/// stream to count as plausible audio.
const MIN_DYNAMIC_RANGE: i32 = 100;
/// Number of leading samples inspected for the dynamic-range check.
const RANGE_SAMPLE_COUNT: usize = 1000;

/// Filesystem-backed validator configured with the service's limits.
pub struct FsAudioValidator {
    max_file_size_bytes: u64,
    supported_formats: Vec<String>,
}

impl FsAudioValidator {
    pub fn new(max_file_size_bytes: u64, supported_formats: Vec<String>) -> Self {
        Self {
            max_file_size_bytes,
            supported_formats,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            config.max_file_size_bytes(),
            config.audio.supported_formats.clone(),
        )
    }

    /// Sanity-check decoded WAV content: a real recording shows variation in
    /// its first samples, a corrupt or DC stream does not.
    fn check_wav_integrity(&self, path: &Path) -> ServiceResult<()> {
        let mut reader =
            hound::WavReader::open(path).map_err(|e| ServiceError::AudioProcessing {
                step: "integrity-check",
                cause: anyhow::Error::new(e),
            })?;

        if reader.spec().sample_format != hound::SampleFormat::Int
            || reader.spec().bits_per_sample != 16
        {
            // Only plain 16-bit PCM gets the amplitude heuristic.
            return Ok(());
        }

        let samples: Vec<i16> = reader
            .samples::<i16>()
            .take(RANGE_SAMPLE_COUNT)
            .collect::<Result<_, _>>()
            .map_err(|e| ServiceError::AudioProcessing {
                step: "integrity-check",
                cause: anyhow::Error::new(e),
            })?;

        if samples.len() < RANGE_SAMPLE_COUNT {
            return Ok(());
        }

        let min = samples.iter().copied().min().unwrap_or(0) as i32;
        let max = samples.iter().copied().max().unwrap_or(0) as i32;
        if max - min < MIN_DYNAMIC_RANGE {
            return Err(ServiceError::AudioProcessing {
                step: "integrity-check",
                cause: anyhow::anyhow!(
                    "audio appears corrupt or silent (dynamic range {} below {})",
                    max - min,
                    MIN_DYNAMIC_RANGE
                ),
            });
        }

        Ok(())
    }
}

impl AudioValidator for FsAudioValidator {
    fn validate(&self, path: &Path) -> ServiceResult<AudioFileInfo> {
        let metadata = std::fs::metadata(path).map_err(|source| ServiceError::FileSystem {
            operation: "stat",
            path: path.to_path_buf(),
            source,
        })?;

        let file_size_bytes = metadata.len();
        if file_size_bytes > self.max_file_size_bytes {
            return Err(ServiceError::FileTooLarge {
                size_bytes: file_size_bytes,
                max_bytes: self.max_file_size_bytes,
            });
        }

        let detected_format = detect_audio_format(path)?;
        if !self.supported_formats.contains(&detected_format) {
            return Err(ServiceError::InvalidFormat {
                provided: detected_format,
                supported: self.supported_formats.clone(),
            });
        }

        let (duration_seconds, sample_rate) = if detected_format == "wav" {
            self.check_wav_integrity(path)?;
            let (duration, rate) = wav_info(path)?;
            (Some(duration), Some(rate))
        } else {
            // Other containers are decoded by the inference backend, which
            // reports their timing.
            (None, None)
        };

        debug!(
            path = %path.display(),
            format = %detected_format,
            size_bytes = file_size_bytes,
            "audio file accepted"
        );

        Ok(AudioFileInfo {
            detected_format,
            duration_seconds,
            sample_rate,
            file_size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn validator() -> FsAudioValidator {
        FsAudioValidator::from_config(&ServiceConfig::default())
    }

    fn write_wav(path: &Path, amplitude: i16, seconds: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (16_000.0 * seconds) as usize;
        for i in 0..frames {
            let sample = if i % 2 == 0 { amplitude } else { -amplitude };
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_accepts_real_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        write_wav(&path, 3000, 0.5);

        let info = validator().validate(&path).unwrap();
        assert_eq!(info.detected_format, "wav");
        assert_eq!(info.sample_rate, Some(16_000));
        assert!((info.duration_seconds.unwrap() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_non_wav_formats_report_unknown_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.mp3");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"ID3\x04\x00\x00\x00\x00\x00\x00 mp3 payload")
            .unwrap();

        let info = validator().validate(&path).unwrap();
        assert_eq!(info.detected_format, "mp3");
        assert_eq!(info.duration_seconds, None);
        assert_eq!(info.sample_rate, None);
    }

    #[test]
    fn test_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.wav");
        write_wav(&path, 3000, 0.5);

        let small = FsAudioValidator::new(100, vec!["wav".into()]);
        let err = small.validate(&path).unwrap_err();
        assert!(matches!(err, ServiceError::FileTooLarge { .. }));
    }

    #[test]
    fn test_rejects_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"plain text, not audio")
            .unwrap();

        let err = validator().validate(&path).unwrap_err();
        match err {
            ServiceError::InvalidFormat { provided, .. } => assert_eq!(provided, "txt"),
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_flat_wav_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flat.wav");
        write_wav(&path, 0, 0.5);

        let err = validator().validate(&path).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::AudioProcessing {
                step: "integrity-check",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_file_reports_stat_failure() {
        let err = validator()
            .validate(Path::new("/nonexistent/audio.wav"))
            .unwrap_err();
        assert!(matches!(err, ServiceError::FileSystem { operation: "stat", .. }));
    }
}
