//! # Audio Processing Module
//!
//! Decoding of uploaded WAV files into model-ready samples, and splitting
//! those samples into fixed-duration segment artifacts for transcription.
//!
//! ## Model Input Format:
//! - **Sample Rate**: 16kHz
//! - **Channels**: Mono
//! - **Encoding**: `f32` in `[-1.0, 1.0]`

pub mod decode;   // WAV decode, downmix, resample
pub mod segment;  // Fixed-duration windowing and segment artifacts
