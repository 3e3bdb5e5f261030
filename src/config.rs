//! # Configuration Management
//!
//! Loads application configuration from multiple sources, lowest priority
//! first:
//! 1. Default values (defined in the Default impl)
//! 2. Configuration file (config.toml)
//! 3. Environment variables with the APP_ prefix
//! 4. Direct environment overrides (`HOST`, `PORT`, `API_KEY`,
//!    `OPENAI_API_KEY`, `WHISPER_MODEL`, `MAX_FILE_SIZE`) used by deployment
//!    platforms and the original service scripts.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Fallback upload limit when `limits.max_file_size` cannot be parsed.
const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub models: ModelsConfig,
    pub openai: OpenAiConfig,
    pub limits: LimitsConfig,
}

/// Server bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// API key required on transcription requests (`X-API-Key` header).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub api_key: String,
}

/// Speech-to-text model settings.
///
/// ## Fields:
/// - `whisper_model`: Whisper size to load ("tiny", "base", "small", "medium", "large")
/// - `device`: inference device preference ("auto", "cpu", "cuda", "metal")
/// - `language`: language hint passed to the decoder (ISO 639-1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub whisper_model: String,
    pub device: String,
    pub language: String,
}

/// Outbound chat-completion settings. An empty `api_key` disables the
/// post-processing step entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
}

/// Request limits.
///
/// `max_file_size` is a human-readable string ("100MB", "2GB", "512KB", or a
/// bare byte count); `segment_duration_secs` is the length of each audio
/// window fed to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_file_size: String,
    pub segment_duration_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            auth: AuthConfig {
                api_key: "audio-trans-secret-key-2024".to_string(),
            },
            models: ModelsConfig {
                whisper_model: "small".to_string(),
                device: "auto".to_string(),
                language: "en".to_string(),
            },
            openai: OpenAiConfig {
                api_key: String::new(),
                model: "gpt-3.5-turbo".to_string(),
            },
            limits: LimitsConfig {
                max_file_size: "100MB".to_string(),
                segment_duration_secs: 300, // 5 minute windows
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Direct overrides: the deployment-platform HOST/PORT pair plus the
        // environment variables the service has always honored.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }
        if let Ok(key) = env::var("API_KEY") {
            settings = settings.set_override("auth.api_key", key)?;
        }
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("openai.api_key", key)?;
        }
        if let Ok(model) = env::var("WHISPER_MODEL") {
            settings = settings.set_override("models.whisper_model", model)?;
        }
        if let Ok(size) = env::var("MAX_FILE_SIZE") {
            settings = settings.set_override("limits.max_file_size", size)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.limits.segment_duration_secs == 0 {
            return Err(anyhow::anyhow!("Segment duration must be greater than 0"));
        }

        if self.limits.max_file_size_bytes() == 0 {
            return Err(anyhow::anyhow!("Max file size must be greater than 0"));
        }

        Ok(())
    }

    /// Whether an OpenAI key is configured (post-processing enabled).
    pub fn openai_enabled(&self) -> bool {
        !self.openai.api_key.trim().is_empty()
    }

    /// Apply a partial update from a JSON body. Only non-secret fields can be
    /// changed at runtime; the result is re-validated before use.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(models) = partial.get("models") {
            if let Some(whisper) = models.get("whisper_model").and_then(|v| v.as_str()) {
                self.models.whisper_model = whisper.to_string();
            }
            if let Some(device) = models.get("device").and_then(|v| v.as_str()) {
                self.models.device = device.to_string();
            }
            if let Some(language) = models.get("language").and_then(|v| v.as_str()) {
                self.models.language = language.to_string();
            }
        }

        if let Some(openai) = partial.get("openai") {
            if let Some(model) = openai.get("model").and_then(|v| v.as_str()) {
                self.openai.model = model.to_string();
            }
        }

        if let Some(limits) = partial.get("limits") {
            if let Some(size) = limits.get("max_file_size").and_then(|v| v.as_str()) {
                self.limits.max_file_size = size.to_string();
            }
            if let Some(secs) = limits.get("segment_duration_secs").and_then(|v| v.as_u64()) {
                self.limits.segment_duration_secs = secs;
            }
        }

        self.validate()?;
        Ok(())
    }
}

impl LimitsConfig {
    /// Resolved upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        parse_file_size(&self.max_file_size)
    }
}

/// Convert a size string like "100MB" to bytes.
///
/// Accepts KB/MB/GB suffixes (case-insensitive) or a bare byte count.
/// Malformed input falls back to 100MB with a warning rather than failing
/// startup.
pub fn parse_file_size(size_str: &str) -> u64 {
    let trimmed = size_str.trim().to_uppercase();
    if trimmed.is_empty() {
        return DEFAULT_MAX_FILE_SIZE;
    }

    let parsed = if let Some(value) = trimmed.strip_suffix("MB") {
        value.trim().parse::<f64>().ok().map(|v| (v as u64) * 1024 * 1024)
    } else if let Some(value) = trimmed.strip_suffix("GB") {
        value.trim().parse::<f64>().ok().map(|v| (v as u64) * 1024 * 1024 * 1024)
    } else if let Some(value) = trimmed.strip_suffix("KB") {
        value.trim().parse::<f64>().ok().map(|v| (v as u64) * 1024)
    } else {
        trimmed.parse::<u64>().ok()
    };

    match parsed {
        Some(bytes) => bytes,
        None => {
            warn!(
                "Could not parse file size '{}', falling back to 100MB",
                size_str
            );
            DEFAULT_MAX_FILE_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.models.whisper_model, "small");
        assert_eq!(config.limits.segment_duration_secs, 300);
        assert!(!config.openai_enabled());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_file_size_units() {
        assert_eq!(parse_file_size("100MB"), 100 * 1024 * 1024);
        assert_eq!(parse_file_size("2GB"), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_file_size("512KB"), 512 * 1024);
        assert_eq!(parse_file_size("1048576"), 1024 * 1024);
        // Suffixes are case-insensitive, surrounding whitespace is ignored
        assert_eq!(parse_file_size(" 50mb "), 50 * 1024 * 1024);
        assert_eq!(parse_file_size("1.5MB"), 1024 * 1024);
    }

    #[test]
    fn test_parse_file_size_fallback() {
        assert_eq!(parse_file_size(""), 100 * 1024 * 1024);
        assert_eq!(parse_file_size("huge"), 100 * 1024 * 1024);
        assert_eq!(parse_file_size("12TB"), 100 * 1024 * 1024);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.limits.segment_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "limits": {"segment_duration_secs": 60}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.limits.segment_duration_secs, 60);
        // Untouched fields keep their values
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.models.whisper_model, "small");
    }

    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = AppConfig::default();
        let json = r#"{"limits": {"segment_duration_secs": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }

    #[test]
    fn test_openai_enabled() {
        let mut config = AppConfig::default();
        assert!(!config.openai_enabled());
        config.openai.api_key = "sk-test".to_string();
        assert!(config.openai_enabled());
    }
}
