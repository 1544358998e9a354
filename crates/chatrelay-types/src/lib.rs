//! Shared domain types for chatrelay.
//!
//! This crate contains the types used across the relay: conversation turns,
//! LLM request/stream shapes, configuration, and the error enums.
//!
//! Zero infrastructure dependencies -- only serde and thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
