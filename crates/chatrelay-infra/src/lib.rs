//! Infrastructure layer for chatrelay.
//!
//! Contains the concrete [`LlmProvider`](chatrelay_core::llm::provider::LlmProvider)
//! implementation (OpenAI-compatible chat completions, Gemini by default),
//! the `config.toml` loader, and environment-variable API key lookup.

pub mod config;
pub mod llm;
pub mod secret;
