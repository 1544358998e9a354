use thiserror::Error;

use crate::llm::LlmError;

/// Errors from a single relay invocation.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The inbound message was missing or empty.
    #[error("invalid message")]
    InvalidMessage,

    /// The provider refused or failed the request before streaming began.
    #[error("provider dispatch failed: {0}")]
    Provider(#[from] LlmError),

    /// The relay was shut down before the provider answered.
    #[error("relay cancelled")]
    Cancelled,
}

/// Errors from loading configuration or wiring the provider.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("environment variable '{0}' is not set")]
    MissingApiKey(String),

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
}
