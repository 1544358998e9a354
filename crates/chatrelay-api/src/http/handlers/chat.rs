//! Streaming chat endpoint.
//!
//! POST /api/chat
//!
//! Body: `{ "message": string, "sessionId"?: string }`. The reply is the
//! assistant's raw text, streamed as `text/plain` chunks in provider order.
//! The resolved session id is echoed in the `X-Session-Id` header.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use serde_json::Value;

use chatrelay_core::relay::RelayRequest;

use crate::http::error::AppError;
use crate::state::AppState;

/// Response header carrying the session the reply was recorded under.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// Decode the request body into a [`RelayRequest`].
///
/// - Not JSON, or JSON `null` → [`AppError::BadRequest`].
/// - `message` missing, not a string, or empty → [`AppError::InvalidMessage`].
/// - `sessionId` absent, `null`, or `""` → fallback session; any other
///   non-string → [`AppError::BadRequest`].
pub fn parse_chat_body(body: &[u8]) -> Result<RelayRequest, AppError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| AppError::BadRequest)?;
    if value.is_null() {
        return Err(AppError::BadRequest);
    }

    let message = match value.get("message") {
        Some(Value::String(m)) if !m.is_empty() => m.clone(),
        _ => return Err(AppError::InvalidMessage),
    };

    let session_id = match value.get("sessionId") {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) if id.is_empty() => None,
        Some(Value::String(id)) => Some(id.clone()),
        Some(_) => return Err(AppError::BadRequest),
    };

    Ok(RelayRequest::new(message, session_id))
}

/// POST /api/chat -- relay one message and stream the reply.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request = parse_chat_body(&body)?;
    let reply = state.relay.send_message(request).await?;

    let session_header = HeaderValue::from_str(reply.session_id()).ok();
    let body = Body::from_stream(reply.map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk))));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    // Ids that are not valid header text are still honored, just not echoed.
    if let Some(value) = session_header {
        headers.insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}
