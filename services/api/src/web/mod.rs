pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers used by the binary that builds the web server router.
pub use rest::{health_handler, list_chapters_handler, story_stats_handler};
pub use ws_handler::ws_handler;

use axum::{routing::get, Router};
use std::sync::Arc;

/// Builds the API router: REST endpoints plus the editing WebSocket.
pub fn router(app_state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stories/{story_id}/chapters", get(list_chapters_handler))
        .route("/stories/{story_id}/stats", get(story_stats_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
