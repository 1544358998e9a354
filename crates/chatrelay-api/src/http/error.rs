//! Application error type mapping to HTTP status codes and plain-text bodies.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use chatrelay_types::error::RelayError;
use chatrelay_types::llm::LlmError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// The body was not JSON, or a field had an unusable type.
    BadRequest,
    /// `message` was missing, not a string, or empty.
    InvalidMessage,
    /// The provider refused the request before any text was streamed.
    Upstream(LlmError),
    /// No session with that id.
    SessionNotFound,
    /// The session has a relay in flight.
    SessionBusy,
    /// The server is shutting down.
    ShuttingDown,
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidMessage => AppError::InvalidMessage,
            RelayError::Provider(err) => AppError::Upstream(err),
            RelayError::Cancelled => AppError::ShuttingDown,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest | AppError::InvalidMessage => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::SessionNotFound => StatusCode::NOT_FOUND,
            AppError::SessionBusy => StatusCode::CONFLICT,
            AppError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Body text. Provider details are logged, never sent to the client.
    pub fn message(&self) -> &'static str {
        match self {
            AppError::BadRequest => "Bad request",
            AppError::InvalidMessage => "Invalid message",
            AppError::Upstream(_) => "Upstream provider error",
            AppError::SessionNotFound => "Session not found",
            AppError::SessionBusy => "Session is busy",
            AppError::ShuttingDown => "Server is shutting down",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Upstream(ref err) = self {
            tracing::warn!(error = %err, "Provider dispatch failed");
        }

        (
            self.status(),
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message(),
        )
            .into_response()
    }
}
