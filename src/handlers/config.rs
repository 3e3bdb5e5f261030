use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    state::AppState,
};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Non-secret view of the configuration. API keys are reported only as
/// configured/not-configured flags.
fn config_view(config: &AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "auth": {
            "api_key_configured": !config.auth.api_key.is_empty()
        },
        "models": {
            "whisper_model": config.models.whisper_model,
            "device": config.models.device,
            "language": config.models.language
        },
        "openai": {
            "api_key_configured": config.openai_enabled(),
            "model": config.openai.model
        },
        "limits": {
            "max_file_size": config.limits.max_file_size,
            "max_file_size_bytes": config.limits.max_file_size_bytes(),
            "segment_duration_secs": config.limits.segment_duration_secs
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_view(&config)
    })))
}

pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> AppResult<HttpResponse> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_view(&current_config)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_view_redacts_secrets() {
        let mut config = AppConfig::default();
        config.openai.api_key = "sk-secret".to_string();

        let view = config_view(&config);
        let rendered = view.to_string();
        assert!(!rendered.contains("sk-secret"));
        assert!(!rendered.contains(&config.auth.api_key));
        assert_eq!(view["openai"]["api_key_configured"], true);
        assert_eq!(view["limits"]["segment_duration_secs"], 300);
    }
}
