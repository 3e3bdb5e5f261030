//! # LLM Post-Processing
//!
//! Optional cleanup/summarization of finished transcripts through an
//! external chat-completion API.

pub mod openai;

pub use openai::process_transcript;
