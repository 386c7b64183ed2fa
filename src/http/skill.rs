//! `GET /api/skill/list`, `POST /api/skill/load`, `POST /api/skill/unload`
//! (spec.md §6) — pinning a skill id into a context's `MetaFile`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use ship_history::HistoryStore;

use crate::http::api_error;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let skills = state.runtime.tools().skills().list();
    Json(serde_json::json!({ "skills": skills }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPinRequest {
    name: String,
    context_id: String,
}

pub async fn load(State(state): State<AppState>, Json(req): Json<SkillPinRequest>) -> Response {
    if !state.runtime.tools().skills().exists(&req.name) {
        return api_error(StatusCode::NOT_FOUND, format!("unknown skill: {}", req.name));
    }
    let history = HistoryStore::new(state.runtime.layout().clone(), req.context_id, state.runtime.config().history.clone());
    match history.add_pinned_skill_id(&req.name) {
        Ok(meta) => Json(serde_json::json!({ "pinnedSkillIds": meta.pinned_skill_ids })).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn unload(State(state): State<AppState>, Json(req): Json<SkillPinRequest>) -> Response {
    let history = HistoryStore::new(state.runtime.layout().clone(), req.context_id, state.runtime.config().history.clone());
    match history.remove_pinned_skill_id(&req.name) {
        Ok(meta) => Json(serde_json::json!({ "pinnedSkillIds": meta.pinned_skill_ids })).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_skill(root: &std::path::Path, name: &str) {
        let dir = root.join(".ship/skills").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("SKILL.md"), format!("---\nname: {name}\ndescription: test skill\n---\nDo the thing.\n")).unwrap();
    }

    #[tokio::test]
    async fn list_is_empty_with_no_skills_directory() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let body = list(State(state)).await.0;
        assert_eq!(body["skills"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn load_rejects_unknown_skill() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let req = SkillPinRequest { name: "ghost".to_string(), context_id: "ctx1".to_string() };
        let resp = load(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn load_then_unload_round_trips_pinned_skill_id() {
        let dir = tempfile::tempdir().unwrap();
        write_skill(dir.path(), "writing");
        let state = crate::state::test_state(dir.path());

        let req = SkillPinRequest { name: "writing".to_string(), context_id: "ctx1".to_string() };
        let resp = load(State(state.clone()), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = SkillPinRequest { name: "writing".to_string(), context_id: "ctx1".to_string() };
        let resp = unload(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
