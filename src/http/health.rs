//! `GET /health`, `GET /api/status` (spec.md §6).

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::Value;

use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn status(State(_state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({
        "name": "shipd",
        "status": "running",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_ok() {
        let body = health().await.0;
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn status_reports_running() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let body = status(State(state)).await.0;
        assert_eq!(body["name"], "shipd");
        assert_eq!(body["status"], "running");
    }
}
