//! OpenAI chat-completion call used to clean up and summarize transcripts.
//!
//! The call is strictly best-effort: when it fails for any reason the caller
//! still gets the raw transcript back, annotated with the error.

use crate::config::OpenAiConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::error;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Instruction prefix used when the caller does not supply one.
const DEFAULT_PROMPT: &str = "\
You are an assistant specialized in text analysis. Your task is to process the following audio transcription:

1. Fix grammar and punctuation errors
2. Structure the text coherently
3. Identify the main points and topics discussed
4. Provide an executive summary at the end

Transcription to process:";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Post-process a transcript with the configured chat model.
///
/// Never fails: with no API key configured the transcript is skipped with a
/// notice, and any API failure degrades to the raw transcript annotated with
/// the error.
pub async fn process_transcript(
    config: &OpenAiConfig,
    transcript: &str,
    custom_prompt: Option<&str>,
) -> String {
    if config.api_key.trim().is_empty() {
        return "OpenAI API key not configured. Transcription completed without additional processing."
            .to_string();
    }

    let prompt = custom_prompt.unwrap_or(DEFAULT_PROMPT);
    let message = compose_message(prompt, transcript);

    match chat_completion(&config.api_key, &config.model, &message).await {
        Ok(text) => text,
        Err(e) => {
            error!("Error processing with OpenAI: {}", e);
            degraded_response(&e.to_string(), transcript)
        }
    }
}

async fn chat_completion(api_key: &str, model: &str, message: &str) -> Result<String> {
    let client = reqwest::Client::new();

    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: message.to_string(),
        }],
        max_tokens: 4000,
        temperature: 0.3,
    };

    let response = client
        .post(OPENAI_API_URL)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("content-type", "application/json")
        .json(&request)
        .send()
        .await
        .context("Failed to send request to OpenAI API")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI API error {}: {}", status, error_text);
    }

    let chat_response: ChatResponse = response
        .json()
        .await
        .context("Failed to parse OpenAI API response")?;

    chat_response
        .choices
        .first()
        .map(|c| c.message.content.clone())
        .context("No choices in OpenAI response")
}

/// Instruction prefix and transcript separated by a blank line.
fn compose_message(prompt: &str, transcript: &str) -> String {
    format!("{}\n\n{}", prompt, transcript)
}

/// Annotate the raw transcript with the post-processing failure.
fn degraded_response(error: &str, transcript: &str) -> String {
    format!(
        "Error processing with OpenAI: {}. Original transcript: {}",
        error, transcript
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_structure() {
        let request = ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "test".to_string(),
            }],
            max_tokens: 4000,
            temperature: 0.3,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("gpt-3.5-turbo"));
        assert!(json.contains("\"max_tokens\":4000"));
        assert!(json.contains("test"));
    }

    #[test]
    fn test_compose_message() {
        let message = compose_message("Summarize:", "hello world");
        assert_eq!(message, "Summarize:\n\nhello world");
    }

    #[test]
    fn test_degraded_response_keeps_transcript() {
        let result = degraded_response("connection refused", "the raw words");
        assert!(result.contains("connection refused"));
        assert!(result.ends_with("the raw words"));
    }

    #[tokio::test]
    async fn test_missing_key_skips_call() {
        let config = OpenAiConfig {
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
        };

        let result = process_transcript(&config, "some text", None).await;
        assert!(result.contains("not configured"));
    }
}
