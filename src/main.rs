//! # AudioTrans Backend - Main Application Entry Point
//!
//! Actix-web server for the audio transcription service:
//! - **config**: layered configuration (TOML file + environment variables)
//! - **state**: shared application state and request metrics
//! - **auth**: API key check for the transcription endpoint
//! - **audio**: WAV decoding and fixed-duration segmentation
//! - **transcription**: Whisper model, engine, and the segment pipeline
//! - **llm**: optional transcript cleanup via a chat-completion API
//! - **health** / **middleware** / **handlers** / **error**: HTTP plumbing
//!
//! The Whisper model is loaded once at startup (with a fallback to the
//! `small` size) and shared by every request for the process lifetime.

mod audio;
mod auth;
mod config;
mod device;
mod error;
mod handlers;
mod health;
mod llm;
mod middleware;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer, middleware::Logger};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::TranscriptionEngine;

/// Global shutdown flag set by the signal handler task.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting audiotrans-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded:");
    info!("  - Whisper model: {}", config.models.whisper_model);
    info!(
        "  - Max file size: {:.1}MB",
        config.limits.max_file_size_bytes() as f64 / (1024.0 * 1024.0)
    );
    info!("  - Segment duration: {}s", config.limits.segment_duration_secs);
    info!("  - Device preference: {}", config.models.device);

    if !config.openai_enabled() {
        warn!("OPENAI_API_KEY is not configured; transcripts will be returned without LLM post-processing");
    }

    // Load the model before accepting traffic. A total failure leaves the
    // server running so /health can report the condition; /transcribe
    // answers 503 until a model is loaded.
    let inference_device = device::device_from_config(&config.models.device);
    info!("Inference device: {}", device::device_label(&inference_device));

    let engine = TranscriptionEngine::new(inference_device, config.models.language.clone());
    match engine.load_startup_model(&config.models.whisper_model).await {
        Ok(size) => info!("Whisper model '{}' loaded successfully", size),
        Err(e) => error!("Could not load any Whisper model: {}", e),
    }

    let app_state = AppState::new(config.clone(), engine);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            // Endpoints matching the original service layout
            .route("/", web::get().to(health::index))
            .route("/health", web::get().to(health::health_check))
            .route("/transcribe", web::post().to(handlers::transcribe_audio))
            // Operational endpoints under a versioned scope
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config)),
            )
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Race the server against the shutdown signal
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audiotrans_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that flip the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag; resolves once it has been set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
