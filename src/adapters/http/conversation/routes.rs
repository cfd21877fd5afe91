//! Axum routes for conversation endpoints.

use axum::routing::{get, patch, post};
use axum::Router;

use super::handlers::{
    create_conversation, export_conversation, get_conversation, patch_participant,
    pause_conversation, resume_conversation, stop_conversation, stream_events, AppState,
};

/// Creates routes for conversation endpoints.
///
/// - POST /conversations - create and launch
/// - GET /conversations/:id - full detail
/// - POST /conversations/:id/pause - pause at next checkpoint
/// - POST /conversations/:id/resume - resume a paused conversation
/// - POST /conversations/:id/stop - request a stop
/// - PATCH /conversations/:id/participants/:index - edit persona/temperature
/// - GET /conversations/:id/events - server-sent event stream
/// - GET /conversations/:id/export - download as JSON
pub fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(create_conversation))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/pause", post(pause_conversation))
        .route("/conversations/:id/resume", post(resume_conversation))
        .route("/conversations/:id/stop", post(stop_conversation))
        .route(
            "/conversations/:id/participants/:index",
            patch(patch_participant),
        )
        .route("/conversations/:id/events", get(stream_events))
        .route("/conversations/:id/export", get(export_conversation))
}

/// Combined router with all conversation routes under /api.
pub fn conversation_router() -> Router<AppState> {
    Router::new().nest("/api", conversation_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_routes_creates_valid_router() {
        let _routes = conversation_routes();
    }

    #[test]
    fn conversation_router_creates_combined_router() {
        let _router = conversation_router();
    }
}
