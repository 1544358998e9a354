//! Axum router configuration with middleware.
//!
//! API routes live under `/api`, plus `/health`. When `web_dir` exists its
//! files are served for every other path (the browser chat client); if it
//! does not, only the API is served.

use std::path::Path;

use axum::Router;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/sessions", get(handlers::session::list_sessions))
        .route(
            "/sessions/{id}",
            get(handlers::session::get_session).delete(handlers::session::delete_session),
        );

    let web_dir = state.config.web_dir.clone();

    let mut router = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if Path::new(&web_dir).is_dir() {
        router = router.fallback_service(ServeDir::new(&web_dir));
        tracing::info!(path = %web_dir, "Static file serving enabled");
    } else {
        tracing::debug!(path = %web_dir, "No web directory, serving the API only");
    }

    router
}
