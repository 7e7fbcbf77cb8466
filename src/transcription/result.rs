//! # Result Assembly
//!
//! Pure transformation from raw engine output plus file metadata into the
//! structured transcription response. No locks, no IO: everything here is
//! deterministic and directly testable.

use crate::error::{ServiceError, ServiceResult};
use crate::transcription::engine::RawTranscription;
use crate::transcription::model::ModelSize;
use serde::Serialize;
use std::time::Duration;

/// One transcribed span of audio. `end_time > start_time` is enforced at
/// construction, so a `Segment` that exists is always well-formed.
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    start_time: f64,
    end_time: f64,
    text: String,
    confidence: Option<f32>,
}

impl Segment {
    pub fn new(
        start_time: f64,
        end_time: f64,
        text: impl Into<String>,
        confidence: Option<f32>,
    ) -> ServiceResult<Self> {
        if end_time <= start_time {
            return Err(ServiceError::InvalidSegment {
                start_time,
                end_time,
            });
        }
        Ok(Self {
            start_time,
            end_time,
            text: text.into().trim().to_string(),
            confidence,
        })
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }
}

/// Structured transcription response returned to the request layer.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    /// Full transcribed text.
    pub text: String,
    /// Language the engine detected (or was hinted).
    pub language: Option<String>,
    /// Duration of the source audio in seconds.
    pub duration: f64,
    /// Ordered segments with timing information.
    pub segments: Vec<Segment>,
    /// Overall confidence in [0, 1], absent when the engine reported no
    /// log-probabilities.
    pub confidence_score: Option<f32>,
    /// Model the transcription ran on.
    pub model_used: ModelSize,
    /// Wall-clock processing time in seconds.
    pub processing_time: f64,
}

/// Build the structured result from raw engine output.
///
/// Segment order is preserved and segment text trimmed. The overall
/// confidence averages the per-segment log-probabilities and maps them into
/// [0, 1] as `clamp(avg + 1, 0, 1)`, a heuristic shift kept for
/// compatibility with existing consumers, not a calibrated probability. When
/// no log-probabilities are present the confidence is absent, not zero, and
/// an empty segment list assembles to an empty result rather than an error.
///
/// When the validator could not determine the duration (non-WAV containers),
/// the end of the engine's last segment stands in for it.
pub fn assemble(
    raw: RawTranscription,
    audio_duration: Option<f64>,
    processing_time: Duration,
    model_used: ModelSize,
) -> ServiceResult<TranscriptionResult> {
    let mut segments = Vec::with_capacity(raw.segments.len());
    for seg in &raw.segments {
        segments.push(Segment::new(seg.start, seg.end, seg.text.clone(), None)?);
    }

    let duration = audio_duration
        .unwrap_or_else(|| segments.last().map(|s| s.end_time()).unwrap_or(0.0));

    let logprobs: Vec<f32> = raw.segments.iter().filter_map(|s| s.avg_logprob).collect();
    let confidence_score = if logprobs.is_empty() {
        None
    } else {
        let avg = logprobs.iter().sum::<f32>() / logprobs.len() as f32;
        Some((avg + 1.0).clamp(0.0, 1.0))
    };

    Ok(TranscriptionResult {
        text: raw.text.trim().to_string(),
        language: raw.language,
        duration,
        segments,
        confidence_score,
        model_used,
        processing_time: round3(processing_time.as_secs_f64()),
    })
}

/// Round to millisecond precision for response payloads.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::engine::RawSegment;

    fn raw(segments: Vec<RawSegment>) -> RawTranscription {
        RawTranscription {
            text: "  Hello there.  ".to_string(),
            language: Some("en".to_string()),
            segments,
        }
    }

    #[test]
    fn test_empty_segments_yield_absent_confidence() {
        let result = assemble(
            raw(vec![]),
            Some(3.5),
            Duration::from_millis(120),
            ModelSize::Base,
        )
        .unwrap();

        assert!(result.segments.is_empty());
        assert_eq!(result.confidence_score, None);
        assert_eq!(result.text, "Hello there.");
        assert_eq!(result.duration, 3.5);
    }

    #[test]
    fn test_confidence_from_log_probabilities() {
        let segments = vec![
            RawSegment {
                start: 0.0,
                end: 1.0,
                text: " first ".into(),
                avg_logprob: Some(-0.1),
            },
            RawSegment {
                start: 1.0,
                end: 2.0,
                text: " second ".into(),
                avg_logprob: Some(-0.3),
            },
        ];
        let result = assemble(
            raw(segments),
            Some(2.0),
            Duration::from_millis(50),
            ModelSize::Small,
        )
        .unwrap();

        // avg(-0.1, -0.3) = -0.2, shifted into [0, 1] -> 0.8
        let confidence = result.confidence_score.unwrap();
        assert!((confidence - 0.8).abs() < 1e-6);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].text(), "first");
        // Per-segment confidence is not derived from the log-probabilities.
        assert_eq!(result.segments[0].confidence(), None);
    }

    #[test]
    fn test_confidence_is_clamped() {
        let segments = vec![RawSegment {
            start: 0.0,
            end: 1.0,
            text: "x".into(),
            avg_logprob: Some(0.5),
        }];
        let result = assemble(raw(segments), Some(1.0), Duration::ZERO, ModelSize::Tiny).unwrap();
        assert_eq!(result.confidence_score, Some(1.0));

        let segments = vec![RawSegment {
            start: 0.0,
            end: 1.0,
            text: "x".into(),
            avg_logprob: Some(-3.0),
        }];
        let result = assemble(raw(segments), Some(1.0), Duration::ZERO, ModelSize::Tiny).unwrap();
        assert_eq!(result.confidence_score, Some(0.0));
    }

    #[test]
    fn test_segment_rejects_inverted_times() {
        let err = Segment::new(1.0, 0.5, "backwards", None).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSegment { .. }));

        // Zero-length segments are invalid too.
        assert!(Segment::new(1.0, 1.0, "empty", None).is_err());
    }

    #[test]
    fn test_assembly_propagates_segment_invariant() {
        let segments = vec![RawSegment {
            start: 2.0,
            end: 1.0,
            text: "bad".into(),
            avg_logprob: None,
        }];
        let err = assemble(raw(segments), Some(2.0), Duration::ZERO, ModelSize::Base).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSegment { .. }));
    }

    #[test]
    fn test_unknown_duration_falls_back_to_last_segment_end() {
        let segments = vec![
            RawSegment {
                start: 0.0,
                end: 1.5,
                text: "a".into(),
                avg_logprob: None,
            },
            RawSegment {
                start: 1.5,
                end: 3.25,
                text: "b".into(),
                avg_logprob: None,
            },
        ];
        let result = assemble(raw(segments), None, Duration::ZERO, ModelSize::Base).unwrap();
        assert_eq!(result.duration, 3.25);

        // No segments and no container timing: nothing to report.
        let result = assemble(raw(vec![]), None, Duration::ZERO, ModelSize::Base).unwrap();
        assert_eq!(result.duration, 0.0);
    }

    #[test]
    fn test_segment_order_is_preserved() {
        let segments = vec![
            RawSegment {
                start: 0.0,
                end: 1.5,
                text: "a".into(),
                avg_logprob: None,
            },
            RawSegment {
                start: 1.5,
                end: 2.25,
                text: "b".into(),
                avg_logprob: None,
            },
            RawSegment {
                start: 2.25,
                end: 4.0,
                text: "c".into(),
                avg_logprob: None,
            },
        ];
        let result = assemble(raw(segments), Some(4.0), Duration::ZERO, ModelSize::Base).unwrap();
        let starts: Vec<f64> = result.segments.iter().map(|s| s.start_time()).collect();
        assert!(starts.windows(2).all(|w| w[0] <= w[1]));
    }
}
