//! # API Key Authentication
//!
//! Transcription requests must carry an `X-API-Key` header matching the
//! configured key. Health and config endpoints stay open.

use crate::config::AppConfig;
use crate::error::AppError;
use actix_web::HttpRequest;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Check the request's API key against the configuration.
///
/// A missing header and a wrong key are rejected identically.
pub fn require_api_key(req: &HttpRequest, config: &AppConfig) -> Result<(), AppError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == config.auth.api_key => Ok(()),
        _ => Err(AppError::Unauthorized("Invalid API key".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.api_key = "expected-key".to_string();
        config
    }

    #[test]
    fn test_valid_key_is_accepted() {
        let req = TestRequest::default()
            .insert_header((API_KEY_HEADER, "expected-key"))
            .to_http_request();
        assert!(require_api_key(&req, &test_config()).is_ok());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let req = TestRequest::default()
            .insert_header((API_KEY_HEADER, "nope"))
            .to_http_request();
        assert!(require_api_key(&req, &test_config()).is_err());
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let req = TestRequest::default().to_http_request();
        assert!(require_api_key(&req, &test_config()).is_err());
    }
}
