//! # Error Handling
//!
//! Custom error types and their conversion to HTTP responses. Every handler
//! returns `Result<HttpResponse, AppError>`; actix turns an `AppError` into a
//! JSON error body via the `ResponseError` impl below.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Application-level errors, one variant per failure category.
///
/// ## HTTP Status Mapping:
/// - `BadRequest` / `ValidationError` → 400
/// - `Unauthorized` → 403
/// - `PayloadTooLarge` → 413
/// - `Internal` / `Transcription` → 500
/// - `ModelUnavailable` → 503
#[derive(Debug)]
pub enum AppError {
    /// Server-side failures with no more specific category
    Internal(String),

    /// Client sent invalid or malformed data (bad multipart, wrong file type)
    BadRequest(String),

    /// Missing or incorrect API key
    Unauthorized(String),

    /// Uploaded file exceeds the configured size limit
    PayloadTooLarge(String),

    /// Audio could not be transcribed (decode failure, every segment failed)
    Transcription(String),

    /// The speech-to-text model is not loaded
    ModelUnavailable(String),

    /// User input failed validation rules (config updates)
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            AppError::Transcription(msg) => write!(f, "Transcription error: {}", msg),
            AppError::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::Unauthorized(msg) => (
                actix_web::http::StatusCode::FORBIDDEN,
                "unauthorized",
                msg.clone(),
            ),
            AppError::PayloadTooLarge(msg) => (
                actix_web::http::StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                msg.clone(),
            ),
            AppError::Transcription(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "transcription_error",
                msg.clone(),
            ),
            AppError::ModelUnavailable(msg) => (
                actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                "model_unavailable",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_code_mapping() {
        let cases = [
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Unauthorized("x".into()), StatusCode::FORBIDDEN),
            (AppError::PayloadTooLarge("x".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::Transcription("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::ModelUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.error_response().status(), expected);
        }
    }

    #[test]
    fn test_display_includes_message() {
        let err = AppError::Transcription("no segments produced text".into());
        assert!(err.to_string().contains("no segments produced text"));
    }
}
