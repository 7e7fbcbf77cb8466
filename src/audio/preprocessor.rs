//! # Audio Preprocessing
//!
//! Normalizes accepted WAV audio into the shape the inference engine expects:
//! mono, 16-bit PCM, at the configured target sample rate, peak-normalized so
//! quiet recordings still land in the model's useful input range. The output
//! is written to a fresh temp file; the input is never modified.

use crate::audio::{temp, AudioPreprocessor};
use crate::error::{ServiceError, ServiceResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Preprocessor for PCM WAV input, writing normalized WAV output under the
/// configured upload directory.
pub struct PcmWavPreprocessor {
    upload_dir: PathBuf,
}

impl PcmWavPreprocessor {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    fn decode(&self, input: &Path) -> ServiceResult<(Vec<f32>, hound::WavSpec)> {
        let decode_err = |e: hound::Error| ServiceError::AudioProcessing {
            step: "decode",
            cause: anyhow::Error::new(e),
        };

        let mut reader = hound::WavReader::open(input).map_err(decode_err)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
            (hound::SampleFormat::Int, bits) => {
                let scale = (1i64 << (bits - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(decode_err)?
            }
            (hound::SampleFormat::Float, _) => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(decode_err)?,
        };

        Ok((samples, spec))
    }
}

impl AudioPreprocessor for PcmWavPreprocessor {
    fn preprocess(&self, input: &Path, target_sample_rate: u32) -> ServiceResult<PathBuf> {
        let (samples, spec) = self.decode(input)?;

        let mono = downmix_to_mono(&samples, spec.channels as usize);
        let normalized = peak_normalize(mono);
        let resampled = resample(&normalized, spec.sample_rate, target_sample_rate);

        debug!(
            input = %input.display(),
            source_rate = spec.sample_rate,
            target_rate = target_sample_rate,
            frames = resampled.len(),
            "audio normalized"
        );

        let output = temp::create_temp_path(&self.upload_dir, "wav")?;
        let out_spec = hound::WavSpec {
            channels: 1,
            sample_rate: target_sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let write = || -> Result<(), hound::Error> {
            let mut writer = hound::WavWriter::create(&output, out_spec)?;
            for sample in &resampled {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(value)?;
            }
            writer.finalize()
        };

        if let Err(e) = write() {
            // Do not leave a half-written file behind.
            temp::cleanup_temp_file(&output);
            return Err(ServiceError::AudioProcessing {
                step: "encode",
                cause: anyhow::Error::new(e),
            });
        }

        Ok(output)
    }
}

fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

fn peak_normalize(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 && peak < 1.0 {
        let gain = 0.95 / peak;
        for s in &mut samples {
            *s *= gain;
        }
    }
    samples
}

/// Linear-interpolation resampler. Adequate for speech input; anything more
/// elaborate belongs in the inference backend.
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stereo_wav(path: &Path, rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let sample = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample / 2).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_normalizes_to_mono_at_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stereo.wav");
        write_stereo_wav(&input, 44_100, 44_100);

        let pre = PcmWavPreprocessor::new(dir.path());
        let output = pre.preprocess(&input, 16_000).unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        // One second of input stays one second of output.
        let duration = reader.duration() as f64 / spec.sample_rate as f64;
        assert!((duration - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_quiet_audio_is_amplified() {
        let quiet = vec![0.01f32, -0.01, 0.01, -0.01];
        let normalized = peak_normalize(quiet);
        let peak = normalized.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!((peak - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_clipping_audio_is_left_alone() {
        let loud = vec![1.0f32, -1.0, 0.5];
        let normalized = peak_normalize(loud.clone());
        assert_eq!(normalized, loud);
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..32_000).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&samples, 32_000, 16_000);
        assert!((out.len() as i64 - 16_000).abs() <= 1);
    }

    #[test]
    fn test_decode_failure_is_an_audio_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("garbage.wav");
        std::fs::write(&input, b"not a wav file at all").unwrap();

        let pre = PcmWavPreprocessor::new(dir.path());
        let err = pre.preprocess(&input, 16_000).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::AudioProcessing { step: "decode", .. }
        ));
    }
}
