//! # Transcription Module
//!
//! Speech-to-text via Whisper models on the Candle-rs framework: model
//! loading and decoding, the engine that owns the loaded model, and the
//! segment-batch pipeline used by the upload endpoint.
//!
//! ## Whisper Model Sizes:
//! - **tiny**: fastest, least accurate
//! - **base**: fast, good for testing
//! - **small**: balanced (the startup fallback)
//! - **medium** / **large**: better accuracy, slower and heavier

pub mod engine;    // Engine owning the loaded model
pub mod model;     // Whisper model loading and decoding
pub mod pipeline;  // Segment batch pipeline

pub use engine::TranscriptionEngine;
