//! Session inspection handlers.
//!
//! Endpoints:
//! - GET    /api/sessions       - List live session ids
//! - GET    /api/sessions/{id}  - Stored turns, oldest first (empty if unseen)
//! - DELETE /api/sessions/{id}  - Drop a session

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use chatrelay_core::session::RemoveOutcome;
use chatrelay_types::chat::ChatTurn;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/sessions - List live session ids, sorted.
pub async fn list_sessions(State(state): State<AppState>) -> Json<ApiResponse<Vec<String>>> {
    let start = Instant::now();
    let mut ids = state.store().session_ids();
    ids.sort();
    Json(ApiResponse::success(ids, start))
}

/// GET /api/sessions/{id} - Stored turns for a session.
///
/// Reading never creates the session.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<ApiResponse<Vec<ChatTurn>>> {
    let start = Instant::now();
    let turns = state.store().get(&session_id);
    Json(ApiResponse::success(turns, start))
}

/// DELETE /api/sessions/{id} - Drop a session and its history.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    match state.store().remove(&session_id) {
        RemoveOutcome::Removed => {
            tracing::info!(session_id = %session_id, "Session deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        RemoveOutcome::NotFound => Err(AppError::SessionNotFound),
        RemoveOutcome::Busy => Err(AppError::SessionBusy),
    }
}
