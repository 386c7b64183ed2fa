//! The HTTP surface (spec.md §6): `axum` + `tower-http`'s `TraceLayer` and
//! `CorsLayer`, `/ship/public/*` served by `ServeDir`, matching the teacher
//! gateway binary's layer stack minus the pieces with no counterpart
//! operation in this spec (rate limiting, websockets — see DESIGN.md).

pub mod chat;
pub mod execute;
pub mod health;
pub mod skill;
pub mod task;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public_dir = state.runtime.layout().public_dir();

    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::status))
        .route("/api/execute", post(execute::execute))
        .route("/api/chat/send", post(chat::chat_send))
        .route("/api/skill/list", get(skill::list))
        .route("/api/skill/load", post(skill::load))
        .route("/api/skill/unload", post(skill::unload))
        .route("/api/task", get(task::list))
        .route("/api/task/:id", get(task::get))
        .route("/api/task/:id/run", post(task::run_now))
        .nest_service("/ship/public", ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `{ "error": "<message>" }`, the shape every handler uses for non-2xx
/// responses.
pub fn api_error(status: axum::http::StatusCode, message: impl Into<String>) -> axum::response::Response {
    use axum::response::IntoResponse;
    (status, axum::Json(serde_json::json!({ "error": message.into() }))).into_response()
}
