//! `POST /api/execute` — synchronous `AgentTurn` on `api:chat:<chatId>`
//! (spec.md §6), bypassing `LaneScheduler` since the call is explicitly
//! synchronous rather than enqueued.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use ship_domain::{ChatMessage, RequestContext};
use ship_history::HistoryStore;

use crate::http::api_error;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    instructions: String,
    #[serde(default)]
    chat_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    success: bool,
    output: String,
    tool_calls: Vec<ship_domain::tool::ToolCall>,
}

pub async fn execute(State(state): State<AppState>, Json(req): Json<ExecuteRequest>) -> Response {
    if req.instructions.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "instructions must not be empty");
    }

    let chat_id = req.chat_id.unwrap_or_else(|| "default".to_string());
    let context_id = format!("api:chat:{chat_id}");

    let runtime = &state.runtime;
    let history = HistoryStore::new(runtime.layout().clone(), context_id.clone(), runtime.config().history.clone());
    if let Err(e) = history.append(&[ChatMessage::user(req.instructions)]).await {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let mut ctx = RequestContext::new(context_id);
    ctx.channel = Some("api".to_string());
    ctx.target_id = Some(chat_id);
    ctx.actor_id = req.user_id;
    ctx.message_id = req.message_id;

    match runtime.turn().run(runtime.provider().as_ref(), &ctx, &state.interactive_capabilities, None).await {
        Ok(outcome) => Json(ExecuteResponse {
            success: outcome.success,
            output: outcome.output,
            tool_calls: outcome.tool_calls,
        })
        .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("turn failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn rejects_empty_instructions() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let req = ExecuteRequest { instructions: "   ".to_string(), chat_id: None, user_id: None, message_id: None };
        let resp = execute(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deserializes_camel_case_wire_fields() {
        let json = r#"{"instructions":"hi","chatId":"room1","userId":"u1","messageId":"m1"}"#;
        let req: ExecuteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.chat_id.as_deref(), Some("room1"));
        assert_eq!(req.user_id.as_deref(), Some("u1"));
        assert_eq!(req.message_id.as_deref(), Some("m1"));
    }

    #[tokio::test]
    async fn runs_a_turn_and_echoes_the_instructions() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let req = ExecuteRequest {
            instructions: "echo this please".to_string(),
            chat_id: Some("room1".to_string()),
            user_id: None,
            message_id: None,
        };
        let resp = execute(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["output"], "echo this please");
    }
}
