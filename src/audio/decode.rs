//! # Audio Decoding
//!
//! Reads uploaded WAV files and converts them to the format the model
//! expects: 16 kHz, mono, normalized `f32` samples.

use anyhow::{anyhow, Context, Result};
use std::path::Path;

/// Sample rate the Whisper model operates at.
pub const MODEL_SAMPLE_RATE: u32 = 16000;

/// Decode a WAV file into interleaved `f32` samples plus its source format.
///
/// Supports integer PCM (up to 32-bit) and 32-bit float WAV files.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32, u16)> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .context("Failed to read float samples")?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<std::result::Result<_, _>>()
                .context("Failed to read integer samples")?
        }
    };

    if samples.is_empty() {
        return Err(anyhow!("WAV file contains no audio data"));
    }

    Ok((samples, spec.sample_rate, spec.channels))
}

/// Downmix interleaved multi-channel audio to mono by averaging channels.
pub fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio to the target rate using a sinc resampler.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        samples.len(),
        1, // mono
    )
    .map_err(|e| anyhow!("Failed to create resampler: {}", e))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| anyhow!("Resample failed: {}", e))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Clamp peaks back into [-1.0, 1.0] if the source was hotter than full scale.
pub fn normalize(samples: &mut [f32]) {
    let max_abs = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if max_abs > 1.0 {
        for sample in samples.iter_mut() {
            *sample /= max_abs;
        }
    }
}

/// Load a WAV file as model-ready audio: 16 kHz, mono, normalized.
pub fn load_for_model(path: &Path) -> Result<Vec<f32>> {
    let (samples, sample_rate, channels) = read_wav(path)?;
    let mono = to_mono(&samples, channels);
    let mut resampled = resample(&mono, sample_rate, MODEL_SAMPLE_RATE)?;
    normalize(&mut resampled);
    Ok(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_to_mono_stereo() {
        let stereo = vec![0.5, 0.3, 0.7, 0.1];
        let mono = to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.4).abs() < 0.01);
        assert!((mono[1] - 0.4).abs() < 0.01);
    }

    #[test]
    fn test_to_mono_passthrough() {
        let mono = vec![0.5, 0.3, 0.7];
        assert_eq!(to_mono(&mono, 1), mono);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.5; 1000];
        let result = resample(&samples, 16000, 16000).unwrap();
        assert_eq!(result.len(), 1000);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![0.5; 48000]; // 1 second at 48kHz
        let result = resample(&samples, 48000, 16000).unwrap();
        assert!(result.len() > 15000 && result.len() < 17000);
    }

    #[test]
    fn test_normalize_clamps_hot_signal() {
        let mut samples = vec![2.0, -1.5, 0.5];
        normalize(&mut samples);
        assert!(samples.iter().all(|&s| (-1.0..=1.0).contains(&s)));
        assert!((samples[0] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_normalize_leaves_quiet_signal_alone() {
        let mut samples = vec![0.2, -0.4];
        normalize(&mut samples);
        assert_eq!(samples, vec![0.2, -0.4]);
    }

    #[test]
    fn test_read_wav_int16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, &[0, i16::MAX, i16::MIN, 0], 16000, 1);

        let (samples, rate, channels) = read_wav(&path).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(channels, 1);
        assert_eq!(samples.len(), 4);
        assert!((samples[1] - 1.0).abs() < 0.01);
        assert!((samples[2] + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_read_wav_missing_file() {
        assert!(read_wav(Path::new("/nonexistent/audio.wav")).is_err());
    }

    #[test]
    fn test_load_for_model_resamples_and_downmixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo48k.wav");
        // 1 second of stereo at 48kHz
        let samples = vec![1000i16; 48000 * 2];
        write_test_wav(&path, &samples, 48000, 2);

        let result = load_for_model(&path).unwrap();
        // Mono at 16kHz, so roughly 16000 samples
        assert!(result.len() > 15000 && result.len() < 17000);
    }
}
