//! # Whisper Model Management
//!
//! Loads Whisper models via Candle-rs and runs greedy decoding over 30-second
//! audio windows. Model weights, tokenizer, and configuration are fetched
//! from the HuggingFace hub and cached locally.
//!
//! ## Loading Process:
//! 1. Download model files from HuggingFace if not cached locally
//! 2. Load model weights and tokenizer
//! 3. Initialize the model on the selected device (CPU/GPU)
//! 4. Validate the model with a short test input

use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Sample rate the model expects.
const SAMPLE_RATE: usize = 16000;

/// Samples in one model input window (30 seconds at 16 kHz).
pub const WINDOW_SAMPLES: usize = 30 * SAMPLE_RATE;

/// Mel frames per 30-second window.
const N_FRAMES: usize = 3000;

/// Upper bound on decoded tokens per window.
const MAX_DECODE_TOKENS: usize = 224;

/// Available Whisper model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace repository holding this model's weights.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
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

/// A loaded Whisper model ready for transcription.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    size: ModelSize,
    tokenizer: Tokenizer,
    sot_token: u32,
    eot_token: u32,
    transcribe_token: u32,
    no_timestamps_token: u32,
}

impl WhisperModel {
    /// Download (if needed) and load a Whisper model onto the given device.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        info!("Loading Whisper {} model...", size);
        let start_time = std::time::Instant::now();

        let api = {
            use hf_hub::api::tokio::ApiBuilder;

            let mut builder = ApiBuilder::new().with_progress(false);
            if let Ok(token) = std::env::var("HF_TOKEN") {
                builder = builder.with_token(Some(token));
            }
            builder
                .build()
                .map_err(|e| anyhow!("Failed to create HuggingFace API client: {}", e))?
        };

        let repo = api.model(size.repo_name().to_string());

        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", size.repo_name(), e))?;
        let tokenizer_filename = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", size.repo_name(), e))?;
        let model_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model weights from {}: {}", size.repo_name(), e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[model_filename], m::DTYPE, &device)?
        };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        // Special token ids, with the standard multilingual fallbacks for
        // tokenizer files that omit them from the vocabulary map.
        let sot_token = tokenizer.token_to_id("<|startoftranscript|>").unwrap_or(50258);
        let eot_token = tokenizer.token_to_id("<|endoftext|>").unwrap_or(50257);
        let transcribe_token = tokenizer.token_to_id("<|transcribe|>").unwrap_or(50359);
        let no_timestamps_token = tokenizer.token_to_id("<|notimestamps|>").unwrap_or(50363);

        let load_time = start_time.elapsed();
        info!("Whisper {} model loaded in {:.2}s", size, load_time.as_secs_f64());

        let mut whisper_model = Self {
            model,
            config,
            device,
            size,
            tokenizer,
            sot_token,
            eot_token,
            transcribe_token,
            no_timestamps_token,
        };

        whisper_model.validate()?;

        Ok(whisper_model)
    }

    /// The size this model was loaded as.
    pub fn size(&self) -> ModelSize {
        self.size
    }

    /// Transcribe one window of audio to text.
    ///
    /// ## Audio Requirements:
    /// - 16 kHz mono `f32` samples in `[-1.0, 1.0]`
    /// - At most 30 seconds; longer input is truncated to the window
    pub fn transcribe(&mut self, audio: &[f32], language: Option<&str>) -> Result<String> {
        if audio.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let start_time = std::time::Instant::now();

        let mel = self.pcm_to_mel(audio)?;
        let mel = mel.unsqueeze(0)?;

        let encoder_output = self.model.encoder.forward(&mel, true)?;

        let mut tokens = vec![self.sot_token];
        if let Some(lang) = language {
            match self.tokenizer.token_to_id(&format!("<|{}|>", lang)) {
                Some(lang_token) => tokens.push(lang_token),
                None => warn!("No token for language '{}', letting the model detect it", lang),
            }
        }
        tokens.push(self.transcribe_token);
        tokens.push(self.no_timestamps_token);
        let prompt_len = tokens.len();

        for i in 0..MAX_DECODE_TOKENS {
            let tokens_t = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&tokens_t, &encoder_output, i == 0)?;

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?;

            let logits: Vec<f32> = logits.to_vec1()?;
            let next_token = argmax(&logits);

            if next_token == self.eot_token {
                break;
            }

            // Greedy decoding can lock into loops on low-information audio;
            // cut the window short instead of emitting garbage.
            if is_repetitive(&tokens[prompt_len..], next_token) {
                debug!("Repetition detected after {} tokens, stopping decode", tokens.len() - prompt_len);
                break;
            }

            tokens.push(next_token);
        }

        let text = self.decode_tokens(&tokens[prompt_len..])?;

        debug!(
            "Transcribed {:.2}s of audio in {:.2}s: '{}'",
            audio.len() as f64 / SAMPLE_RATE as f64,
            start_time.elapsed().as_secs_f64(),
            text
        );

        Ok(text)
    }

    /// Convert PCM audio to a log-mel input tensor of shape
    /// (num_mel_bins, N_FRAMES), padding or truncating to the 30s window.
    fn pcm_to_mel(&self, pcm_data: &[f32]) -> Result<Tensor> {
        let mut padded_audio = vec![0.0f32; WINDOW_SAMPLES];
        let copy_len = pcm_data.len().min(WINDOW_SAMPLES);
        padded_audio[..copy_len].copy_from_slice(&pcm_data[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let mut mel_data = vec![0.0f32; n_mels * N_FRAMES];

        // Framed log-energy features in place of a full STFT mel filterbank,
        // with a triangular emphasis across the mel bins.
        let frame_size = padded_audio.len() / N_FRAMES;
        for frame in 0..N_FRAMES {
            let start = frame * frame_size;
            let end = (start + frame_size).min(padded_audio.len());

            let mut energy = 0.0f32;
            for &sample in &padded_audio[start..end] {
                energy += sample.abs();
            }
            let log_energy = (energy / frame_size as f32).ln().max(-11.5129); // -80 dB floor

            for mel_bin in 0..n_mels {
                let weight = 1.0 - (mel_bin as f32 / n_mels as f32) * 0.5;
                mel_data[mel_bin * N_FRAMES + frame] = log_energy * weight;
            }
        }

        Ok(Tensor::from_vec(mel_data, (n_mels, N_FRAMES), &self.device)?)
    }

    /// Run a short silence through the full decode path to confirm the model
    /// is usable before the server starts accepting work.
    fn validate(&mut self) -> Result<()> {
        debug!("Validating Whisper model with test input...");
        let test_audio = vec![0.0f32; SAMPLE_RATE];
        let result = self.transcribe(&test_audio, Some("en"))?;
        debug!("Model validation successful, test result: '{}'", result);
        Ok(())
    }

    /// Decode tokens to text, stripping residual special markers.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");

        Ok(cleaned.trim().to_string())
    }
}

/// Index of the largest logit.
fn argmax(logits: &[f32]) -> u32 {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (index, &value) in logits.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best = index;
        }
    }
    best as u32
}

/// Detect immediate token loops (AAA) and short pattern loops (ABCABC).
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    if tokens.len() >= 2 {
        let n = tokens.len();
        if tokens[n - 1] == new_token && tokens[n - 2] == new_token {
            return true;
        }
    }

    if tokens.len() >= 6 {
        let n = tokens.len();
        if tokens[n - 3..] == tokens[n - 6..n - 3] {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("small".parse::<ModelSize>().unwrap(), ModelSize::Small);
        assert_eq!("LARGE".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("enormous".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_roundtrip() {
        for size in [
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::Large,
        ] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
        }
    }

    #[test]
    fn test_repo_names() {
        assert_eq!(ModelSize::Small.repo_name(), "openai/whisper-small");
        assert_eq!(ModelSize::Large.repo_name(), "openai/whisper-large-v2");
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 3.0, -1.0, 2.9]), 1);
        assert_eq!(argmax(&[-5.0]), 0);
    }

    #[test]
    fn test_repetition_detection() {
        // Immediate repetition: last two tokens equal the candidate
        assert!(is_repetitive(&[7, 9, 9], 9));
        assert!(!is_repetitive(&[7, 9, 8], 9));

        // Pattern repetition: ABC ABC
        assert!(is_repetitive(&[1, 2, 3, 1, 2, 3], 4));
        assert!(!is_repetitive(&[1, 2, 3, 4, 5, 6], 7));
    }
}
