//! # Transcription Upload Handler
//!
//! `POST /transcribe`: accepts a multipart WAV upload plus an optional
//! `custom_prompt` field, runs the segment pipeline, and optionally forwards
//! the joined transcript for LLM cleanup.
//!
//! All scratch files (the uploaded audio and every segment artifact) live in
//! a per-request temporary directory that is removed when the request
//! finishes, whether it succeeded or failed.

use crate::auth;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::llm;
use crate::state::AppState;
use crate::transcription::pipeline;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Parsed multipart upload.
struct Upload {
    filename: String,
    data: Vec<u8>,
    custom_prompt: Option<String>,
}

pub async fn transcribe_audio(
    req: HttpRequest,
    mut payload: Multipart,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let config = state.get_config();
    auth::require_api_key(&req, &config)?;

    if !state.engine.is_model_loaded().await {
        return Err(AppError::ModelUnavailable(
            "Whisper model is not available".to_string(),
        ));
    }

    let upload = read_upload(&mut payload, config.limits.max_file_size_bytes()).await?;
    validate_filename(&upload.filename)?;

    let request_id = Uuid::new_v4();
    info!(
        request_id = %request_id,
        "File received: {}, size: {} bytes ({:.1}MB)",
        upload.filename,
        upload.data.len(),
        upload.data.len() as f64 / (1024.0 * 1024.0)
    );

    state.increment_active_jobs();
    let result = process_upload(&state, &config, upload).await;
    state.decrement_active_jobs();
    result
}

/// Run the pipeline inside a scratch directory that is deleted on drop.
async fn process_upload(
    state: &web::Data<AppState>,
    config: &AppConfig,
    upload: Upload,
) -> AppResult<HttpResponse> {
    let workdir = tempfile::tempdir()
        .map_err(|e| AppError::Internal(format!("Failed to create temp directory: {}", e)))?;

    let input_path = workdir.path().join("upload.wav");
    tokio::fs::write(&input_path, &upload.data).await?;

    let outcome = pipeline::transcribe_file(
        &state.engine,
        &input_path,
        config.limits.segment_duration_secs,
        workdir.path(),
    )
    .await?;

    info!("Step 3/3: sending transcript for LLM post-processing...");
    let processed_response = llm::process_transcript(
        &config.openai,
        &outcome.text,
        upload.custom_prompt.as_deref(),
    )
    .await;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "original_filename": upload.filename,
        "segments_processed": outcome.segments_processed,
        "transcription_length": outcome.text.len(),
        "raw_transcription": outcome.text,
        "processed_response": processed_response,
        "message": "Audio transcribed and processed successfully"
    })))
}

/// Collect the multipart fields: the audio file plus an optional prompt.
/// The size limit is enforced while streaming so an oversized upload is
/// rejected without buffering the whole body.
async fn read_upload(payload: &mut Multipart, max_bytes: u64) -> Result<Upload, AppError> {
    let mut filename: Option<String> = None;
    let mut data: Vec<u8> = Vec::new();
    let mut custom_prompt: Option<String> = None;
    let mut saw_file = false;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let (field_name, field_filename) = {
            let content_disposition = field
                .content_disposition()
                .ok_or_else(|| AppError::BadRequest("Missing content disposition".to_string()))?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| AppError::BadRequest("Missing field name".to_string()))?
                .to_string();
            let file = content_disposition.get_filename().map(|s| s.to_string());
            (name, file)
        };

        match field_name.as_str() {
            "file" => {
                saw_file = true;
                filename = field_filename;

                while let Some(chunk) = field.next().await {
                    let chunk =
                        chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                    ensure_within_limit(data.len() + chunk.len(), max_bytes)?;
                    data.extend_from_slice(&chunk);
                }
            }
            "custom_prompt" => {
                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk =
                        chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                    bytes.extend_from_slice(&chunk);
                }
                let prompt = String::from_utf8(bytes).map_err(|_| {
                    AppError::BadRequest("custom_prompt must be valid UTF-8".to_string())
                })?;
                if !prompt.trim().is_empty() {
                    custom_prompt = Some(prompt);
                }
            }
            // Unknown fields are drained and ignored
            _ => {
                while let Some(chunk) = field.next().await {
                    chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
                }
            }
        }
    }

    if !saw_file || data.is_empty() {
        return Err(AppError::BadRequest("No audio file provided".to_string()));
    }

    Ok(Upload {
        filename: filename.unwrap_or_else(|| "unknown.wav".to_string()),
        data,
        custom_prompt,
    })
}

fn ensure_within_limit(total_bytes: usize, max_bytes: u64) -> Result<(), AppError> {
    if total_bytes as u64 > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File too large. Maximum allowed size: {:.1}MB",
            max_bytes as f64 / (1024.0 * 1024.0)
        )));
    }
    Ok(())
}

fn validate_filename(filename: &str) -> Result<(), AppError> {
    if !filename.to_lowercase().ends_with(".wav") {
        return Err(AppError::BadRequest(
            "Only .wav files are accepted".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("meeting.wav").is_ok());
        assert!(validate_filename("MEETING.WAV").is_ok());
        assert!(validate_filename("meeting.m4a").is_err());
        assert!(validate_filename("meeting").is_err());
    }

    #[test]
    fn test_size_limit() {
        assert!(ensure_within_limit(100, 100).is_ok());
        assert!(ensure_within_limit(101, 100).is_err());

        let err = ensure_within_limit(200 * 1024 * 1024, 100 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert!(err.to_string().contains("100.0MB"));
    }
}
