//! `POST /api/chat/send` — enqueue egress to the platform (spec.md §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::http::api_error;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendRequest {
    chat_key: String,
    text: String,
}

pub async fn chat_send(State(state): State<AppState>, Json(req): Json<ChatSendRequest>) -> Response {
    let Some(egress) = state.runtime.egress() else {
        return api_error(StatusCode::SERVICE_UNAVAILABLE, "no egress sender configured");
    };

    match egress.chat_send(&req.chat_key, &req.text).await {
        Ok(()) => Json(serde_json::json!({ "sent": true })).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chat_send_delivers_through_configured_egress() {
        let dir = tempfile::tempdir().unwrap();
        let state = crate::state::test_state(dir.path());
        let req = ChatSendRequest { chat_key: "room:1".to_string(), text: "hi".to_string() };
        let resp = chat_send(State(state), Json(req)).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
