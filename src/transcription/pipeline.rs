//! # Transcription Pipeline
//!
//! The batch pipeline behind `POST /transcribe`: decode the uploaded audio,
//! split it into fixed-duration segment artifacts, transcribe each segment in
//! order, and join the results.
//!
//! A failed segment contributes an empty string instead of aborting the
//! batch; the request only fails outright when every segment failed.

use crate::audio::{decode, segment};
use crate::error::AppError;
use crate::transcription::TranscriptionEngine;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Result of a completed pipeline run.
#[derive(Debug)]
pub struct TranscriptionOutcome {
    /// Joined transcript of all non-empty segments
    pub text: String,

    /// Number of segment artifacts processed
    pub segments_processed: usize,
}

/// Run the full pipeline over an uploaded audio file.
///
/// `workdir` receives the per-segment WAV artifacts; the caller owns the
/// directory and is responsible for deleting it afterwards.
pub async fn transcribe_file(
    engine: &TranscriptionEngine,
    input: &Path,
    segment_duration_secs: u64,
    workdir: &Path,
) -> Result<TranscriptionOutcome, AppError> {
    info!("Step 1/3: splitting audio into {}s segments...", segment_duration_secs);
    let samples = decode::load_for_model(input)
        .map_err(|e| AppError::Transcription(format!("Error processing audio file: {}", e)))?;

    let segment_paths = segment::split_audio(&samples, segment_duration_secs, workdir)
        .map_err(|e| AppError::Transcription(format!("Error splitting audio: {}", e)))?;
    info!("Audio split into {} segments", segment_paths.len());

    info!("Step 2/3: transcribing segments with Whisper...");
    let texts = transcribe_segments(engine, &segment_paths).await;
    let joined = join_transcripts(&texts);

    if joined.trim().is_empty() {
        return Err(AppError::Transcription(
            "Could not transcribe any audio segment".to_string(),
        ));
    }

    info!("Transcription completed: {} characters", joined.len());

    Ok(TranscriptionOutcome {
        text: joined,
        segments_processed: segment_paths.len(),
    })
}

/// Transcribe each segment in order, recording an empty string for any
/// segment that fails so one bad window never aborts the batch.
pub async fn transcribe_segments(
    engine: &TranscriptionEngine,
    segment_paths: &[PathBuf],
) -> Vec<String> {
    let mut transcriptions = Vec::with_capacity(segment_paths.len());

    for (index, path) in segment_paths.iter().enumerate() {
        info!("Transcribing segment {}/{}", index + 1, segment_paths.len());

        match engine.transcribe_wav_file(path).await {
            Ok(text) => {
                let text = text.trim().to_string();
                info!("Segment {} transcribed: {} characters", index + 1, text.len());
                transcriptions.push(text);
            }
            Err(e) => {
                error!("Error transcribing segment {}: {}", index + 1, e);
                transcriptions.push(String::new());
            }
        }
    }

    if transcriptions.iter().all(|t| t.is_empty()) && !transcriptions.is_empty() {
        warn!("All {} segments failed to transcribe", transcriptions.len());
    }

    transcriptions
}

/// Join per-segment texts with a single space, dropping empty entries and
/// preserving original order.
pub fn join_transcripts(texts: &[String]) -> String {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_join_preserves_order() {
        let texts = strings(&["first", "second", "third"]);
        assert_eq!(join_transcripts(&texts), "first second third");
    }

    #[test]
    fn test_join_skips_empty_entries() {
        let texts = strings(&["first", "", "third", ""]);
        assert_eq!(join_transcripts(&texts), "first third");
    }

    #[test]
    fn test_join_treats_whitespace_as_empty() {
        let texts = strings(&["  ", "only", "\t"]);
        assert_eq!(join_transcripts(&texts), "only");
    }

    #[test]
    fn test_join_all_failed_is_empty() {
        let texts = strings(&["", "", ""]);
        assert_eq!(join_transcripts(&texts), "");
        assert!(join_transcripts(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_segment_failures_become_empty_strings() {
        // No model is loaded, so every segment fails; the batch must still
        // complete with one entry per segment, in order.
        let engine = TranscriptionEngine::new(Device::Cpu, "en".to_string());

        let dir = tempfile::tempdir().unwrap();
        let samples = vec![0.1f32; decode::MODEL_SAMPLE_RATE as usize * 2];
        let paths = segment::split_audio(&samples, 1, dir.path()).unwrap();
        assert_eq!(paths.len(), 2);

        let texts = transcribe_segments(&engine, &paths).await;
        assert_eq!(texts, vec!["".to_string(), "".to_string()]);
    }

    #[tokio::test]
    async fn test_pipeline_fails_when_every_segment_fails() {
        let engine = TranscriptionEngine::new(Device::Cpu, "en".to_string());

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&input, spec).unwrap();
        for _ in 0..16000 {
            writer.write_sample(1000i16).unwrap();
        }
        writer.finalize().unwrap();

        let workdir = tempfile::tempdir().unwrap();
        let result = transcribe_file(&engine, &input, 300, workdir.path()).await;
        assert!(matches!(result, Err(AppError::Transcription(_))));
    }
}
