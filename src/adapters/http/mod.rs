//! HTTP adapters - Axum routers exposing the orchestration API.

pub mod conversation;

use axum::routing::get;
use axum::{Json, Router};

pub use conversation::AppState;

/// Builds the full application router.
pub fn app_router(state: AppState) -> Router {
    conversation::conversation_router()
        .route("/health", get(health))
        .with_state(state)
}

/// GET /health - liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
