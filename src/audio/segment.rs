//! # Audio Segmentation
//!
//! Splits decoded audio into contiguous, non-overlapping windows of a fixed
//! duration and materializes each window as an independent WAV file. Windows
//! are produced in original time order; the final window may be shorter.

use crate::audio::decode::MODEL_SAMPLE_RATE;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Compute `[start, end)` sample ranges for fixed-size windows.
///
/// The last window covers whatever remains and may be shorter than
/// `samples_per_window`. Empty input yields no windows.
pub fn segment_bounds(total_samples: usize, samples_per_window: usize) -> Vec<(usize, usize)> {
    if samples_per_window == 0 {
        return Vec::new();
    }

    (0..total_samples)
        .step_by(samples_per_window)
        .map(|start| (start, (start + samples_per_window).min(total_samples)))
        .collect()
}

/// Split 16 kHz mono audio into windows of `segment_duration_secs` and write
/// each as `segment_NNN.wav` under `dir`. Returns the artifact paths in time
/// order.
pub fn split_audio(
    samples: &[f32],
    segment_duration_secs: u64,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let samples_per_window = (segment_duration_secs as usize) * MODEL_SAMPLE_RATE as usize;
    let bounds = segment_bounds(samples.len(), samples_per_window);

    let mut segment_paths = Vec::with_capacity(bounds.len());
    for (index, (start, end)) in bounds.iter().enumerate() {
        let path = dir.join(format!("segment_{:03}.wav", index));
        write_segment_wav(&path, &samples[*start..*end])
            .with_context(|| format!("Failed to write segment {}", index))?;

        info!(
            "Segment {}/{} created: {}",
            index + 1,
            bounds.len(),
            path.display()
        );
        segment_paths.push(path);
    }

    Ok(segment_paths)
}

/// Write a 16 kHz mono 16-bit PCM WAV file.
fn write_segment_wav(path: &Path, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: MODEL_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_exact_multiple() {
        let bounds = segment_bounds(300, 100);
        assert_eq!(bounds, vec![(0, 100), (100, 200), (200, 300)]);
    }

    #[test]
    fn test_bounds_ragged_tail() {
        let bounds = segment_bounds(250, 100);
        assert_eq!(bounds, vec![(0, 100), (100, 200), (200, 250)]);
    }

    #[test]
    fn test_bounds_shorter_than_one_window() {
        let bounds = segment_bounds(42, 100);
        assert_eq!(bounds, vec![(0, 42)]);
    }

    #[test]
    fn test_bounds_empty_input() {
        assert!(segment_bounds(0, 100).is_empty());
    }

    #[test]
    fn test_bounds_zero_window() {
        assert!(segment_bounds(100, 0).is_empty());
    }

    #[test]
    fn test_split_audio_materializes_ordered_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        // 2.5 windows of 1 second each
        let samples = vec![0.1f32; (MODEL_SAMPLE_RATE as usize) * 5 / 2];

        let paths = split_audio(&samples, 1, dir.path()).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("segment_000.wav"));
        assert!(paths[2].ends_with("segment_002.wav"));

        // First windows are full length, the tail is shorter
        let full = hound::WavReader::open(&paths[0]).unwrap();
        assert_eq!(full.len(), MODEL_SAMPLE_RATE);
        let tail = hound::WavReader::open(&paths[2]).unwrap();
        assert_eq!(tail.len(), MODEL_SAMPLE_RATE / 2);
        assert_eq!(tail.spec().sample_rate, MODEL_SAMPLE_RATE);
        assert_eq!(tail.spec().channels, 1);
    }

    #[test]
    fn test_split_audio_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let paths = split_audio(&[], 300, dir.path()).unwrap();
        assert!(paths.is_empty());
    }
}
