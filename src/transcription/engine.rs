//! # Transcription Engine
//!
//! Owns the loaded Whisper model and exposes file- and sample-level
//! transcription. The model is loaded once at startup and shared for the
//! lifetime of the process; `RwLock` serializes inference passes while
//! letting status checks proceed concurrently.

use crate::audio::decode;
use crate::transcription::model::{ModelSize, WhisperModel, WINDOW_SAMPLES};
use anyhow::{anyhow, Result};
use candle_core::Device;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct TranscriptionEngine {
    /// Currently loaded model, `None` until startup loading succeeds
    model: Arc<RwLock<Option<WhisperModel>>>,

    /// Language hint passed to the decoder
    language: String,

    /// Device used for inference
    device: Device,
}

impl TranscriptionEngine {
    pub fn new(device: Device, language: String) -> Self {
        Self {
            model: Arc::new(RwLock::new(None)),
            language,
            device,
        }
    }

    /// Load the configured model, falling back to `small` if that fails.
    ///
    /// Returns the size that actually ended up loaded.
    pub async fn load_startup_model(&self, configured: &str) -> Result<ModelSize> {
        let size: ModelSize = configured.parse().unwrap_or_else(|e| {
            warn!("{}; defaulting to small", e);
            ModelSize::Small
        });

        match self.load_model(size).await {
            Ok(()) => Ok(size),
            Err(e) => {
                error!("Error loading Whisper model '{}': {}", size, e);
                if size == ModelSize::Small {
                    return Err(e);
                }
                info!("Trying to load 'small' model as fallback...");
                self.load_model(ModelSize::Small).await?;
                info!("Whisper 'small' model loaded as fallback");
                Ok(ModelSize::Small)
            }
        }
    }

    /// Load a specific model, replacing any previously loaded one.
    pub async fn load_model(&self, size: ModelSize) -> Result<()> {
        let new_model = WhisperModel::load(size, self.device.clone()).await?;

        let mut model_guard = self.model.write().await;
        *model_guard = Some(new_model);

        Ok(())
    }

    /// Whether a model is loaded and ready for inference.
    pub async fn is_model_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }

    /// Name of the loaded model, if any.
    pub async fn model_name(&self) -> Option<String> {
        self.model.read().await.as_ref().map(|m| m.size().to_string())
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Transcribe 16 kHz mono samples. Input longer than the model's
    /// 30-second window is processed as consecutive windows and joined.
    pub async fn transcribe_samples(&self, samples: &[f32]) -> Result<String> {
        if samples.is_empty() {
            return Err(anyhow!("No audio data to transcribe"));
        }

        let mut model_guard = self.model.write().await;
        let model = model_guard
            .as_mut()
            .ok_or_else(|| anyhow!("No model loaded for transcription"))?;

        let mut parts = Vec::new();
        for chunk in samples.chunks(WINDOW_SAMPLES) {
            let text = model.transcribe(chunk, Some(self.language.as_str()))?;
            if !text.is_empty() {
                parts.push(text);
            }
        }

        Ok(parts.join(" ").trim().to_string())
    }

    /// Decode a WAV file and transcribe it.
    pub async fn transcribe_wav_file(&self, path: &Path) -> Result<String> {
        let samples = decode::load_for_model(path)?;
        self.transcribe_samples(&samples).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_starts_unloaded() {
        let engine = TranscriptionEngine::new(Device::Cpu, "en".to_string());
        assert!(!engine.is_model_loaded().await);
        assert!(engine.model_name().await.is_none());
    }

    #[tokio::test]
    async fn test_transcribe_without_model_fails() {
        let engine = TranscriptionEngine::new(Device::Cpu, "en".to_string());
        let samples = vec![0.0f32; 16000];
        assert!(engine.transcribe_samples(&samples).await.is_err());
    }

    #[tokio::test]
    async fn test_transcribe_empty_input_fails() {
        let engine = TranscriptionEngine::new(Device::Cpu, "en".to_string());
        assert!(engine.transcribe_samples(&[]).await.is_err());
    }
}
