//! # Format Detection
//!
//! Identifies the audio container from the file's leading bytes rather than
//! trusting the upload's extension. The extension is only consulted as a
//! fallback when no signature matches (some MP3 streams have no ID3 header).

use crate::error::{ServiceError, ServiceResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Detect the audio format from the file's byte signature.
///
/// Returns the lowercase extension name (`"wav"`, `"mp3"`, ...) or falls back
/// to the path's own extension when the first bytes match nothing known.
pub fn detect_audio_format(path: &Path) -> ServiceResult<String> {
    let mut file = File::open(path).map_err(|source| ServiceError::FileSystem {
        operation: "open",
        path: path.to_path_buf(),
        source,
    })?;

    let mut header = [0u8; 12];
    let read = file
        .read(&mut header)
        .map_err(|source| ServiceError::FileSystem {
            operation: "read",
            path: path.to_path_buf(),
            source,
        })?;
    let header = &header[..read];

    if let Some(format) = match_signature(header) {
        return Ok(format.to_string());
    }

    Ok(path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default())
}

fn match_signature(header: &[u8]) -> Option<&'static str> {
    if header.len() < 4 {
        return None;
    }

    if header.starts_with(b"ID3") || header[0] == 0xFF && (header[1] & 0xE0) == 0xE0 {
        return Some("mp3");
    }
    if header.starts_with(b"RIFF") && header.len() >= 12 && &header[8..12] == b"WAVE" {
        return Some("wav");
    }
    if header.starts_with(b"OggS") {
        return Some("ogg");
    }
    if header.starts_with(b"fLaC") {
        return Some("flac");
    }
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return Some("m4a");
    }
    // ASF container (WMA)
    if header.starts_with(&[0x30, 0x26, 0xB2, 0x75]) {
        return Some("wma");
    }

    None
}

/// Duration and sample rate of a WAV file, read from its header.
pub fn wav_info(path: &Path) -> ServiceResult<(f64, u32)> {
    let reader = hound::WavReader::open(path).map_err(|e| ServiceError::AudioProcessing {
        step: "wav-header",
        cause: anyhow::Error::new(e),
    })?;
    let spec = reader.spec();
    let frames = reader.duration();
    let duration = frames as f64 / spec.sample_rate as f64;
    Ok((duration, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file_with(bytes: &[u8], name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn test_detects_common_signatures() {
        let cases: [(&[u8], &str); 5] = [
            (b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00", "mp3"),
            (b"RIFF\x24\x00\x00\x00WAVEfmt ", "wav"),
            (b"OggS\x00\x02\x00\x00\x00\x00\x00\x00", "ogg"),
            (b"fLaC\x00\x00\x00\x22\x00\x00\x00\x00", "flac"),
            (b"\x00\x00\x00\x20ftypM4A \x00\x00", "m4a"),
        ];
        for (bytes, expected) in cases {
            let (_dir, path) = file_with(bytes, "sample.bin");
            assert_eq!(detect_audio_format(&path).unwrap(), expected);
        }
    }

    #[test]
    fn test_falls_back_to_extension() {
        let (_dir, path) = file_with(b"no signature here", "speech.mp3");
        assert_eq!(detect_audio_format(&path).unwrap(), "mp3");
    }

    #[test]
    fn test_missing_file_is_a_filesystem_error() {
        let err = detect_audio_format(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::FileSystem {
                operation: "open",
                ..
            }
        ));
    }

    #[test]
    fn test_wav_info_reads_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..16_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let (duration, rate) = wav_info(&path).unwrap();
        assert_eq!(rate, 16_000);
        assert!((duration - 1.0).abs() < 1e-6);
    }
}
