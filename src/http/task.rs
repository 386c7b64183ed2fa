//! `* /api/task/*` (spec.md §6) — list task definitions, inspect one, and
//! fire a run-now, backed by `ship-tasks`' `TaskStore`/`TaskRunner`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ship_domain::Error;

use crate::http::api_error;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let tasks = state.task_store.list();
    Json(serde_json::json!({ "tasks": tasks }))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.task_store.load(&id) {
        Ok(task) => {
            let last_run_at = state.task_store.last_run_at(&id);
            Json(serde_json::json!({ "task": task, "lastRunAt": last_run_at })).into_response()
        }
        Err(_) => api_error(StatusCode::NOT_FOUND, format!("no such task: {id}")),
    }
}

pub async fn run_now(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.tasks.run_now(&id).await {
        Ok(()) => Json(serde_json::json!({ "started": true })).into_response(),
        Err(e @ Error::NotFound(_)) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => api_error(StatusCode::CONFLICT, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_task(root: &std::path::Path, id: &str) {
        let layout = ship_domain::PathLayout::new(root);
        let path = layout.task_definition_file(id);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "---\ntitle: Daily report\ncron: \"0 9 * * *\"\ncontext_id: api:chat:default\n---\nrun it\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn list_is_empty_with_no_tasks_directory() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let body = list(State(state)).await.0;
        assert_eq!(body["tasks"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn get_returns_404_for_unknown_task() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let resp = get(State(state), Path("ghost".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_returns_task_and_no_last_run() {
        let dir = tempfile::tempdir().unwrap();
        write_task(dir.path(), "daily");
        let state = crate::state::test_state(dir.path());
        let resp = get(State(state), Path("daily".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn run_now_returns_404_for_unknown_task() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let resp = run_now(State(state), Path("ghost".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_now_starts_an_existing_task() {
        let dir = tempfile::tempdir().unwrap();
        write_task(dir.path(), "daily");
        let state = crate::state::test_state(dir.path());
        let resp = run_now(State(state), Path("daily".to_string())).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
