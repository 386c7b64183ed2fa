//! `EchoProvider` — the degraded-mode default `LlmProvider`.
//!
//! Concrete LLM provider HTTP clients are an out-of-scope external
//! collaborator (§1), exactly like `PlatformSender`'s concrete chat-platform
//! clients. A real deployment supplies its own `LlmProvider` through the
//! same trait `ship-providers` defines; this one exists so `shipd` boots and
//! answers `/api/execute` end to end without any external credentials,
//! mirroring the teacher's own graceful-degradation stance when no LLM
//! provider is configured ("gateway will run but LLM calls will fail").

use async_trait::async_trait;
use futures_util::stream;
use ship_domain::Result;
use ship_providers::{BoxStream, ChatRequest, ChatResponse, LlmCapabilities, LlmProvider, StreamEvent};

pub struct EchoProvider {
    capabilities: LlmCapabilities,
}

impl EchoProvider {
    pub fn new() -> Self {
        tracing::warn!(
            "no LlmProvider configured — running with the built-in EchoProvider; \
             replies echo the last user message verbatim"
        );
        Self {
            capabilities: LlmCapabilities {
                supports_tools: false,
                supports_streaming: true,
                context_window_tokens: None,
                max_output_tokens: None,
            },
        }
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn last_user_text(req: &ChatRequest) -> String {
    req.messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, ship_providers::ModelRole::User))
        .map(|m| m.text())
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: last_user_text(req),
            tool_calls: Vec::new(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let events = vec![
            StreamEvent::Token { text: last_user_text(req) },
            StreamEvent::Done { usage: None, finish_reason: Some("stop".to_string()) },
        ];
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use ship_providers::ModelMessage;

    fn req_with(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ModelMessage::system("sys"), ModelMessage::user(text)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn chat_echoes_last_user_message() {
        let provider = EchoProvider::new();
        let resp = provider.chat(&req_with("hello there")).await.unwrap();
        assert_eq!(resp.content, "hello there");
        assert!(resp.tool_calls.is_empty());
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn chat_stream_emits_token_then_done() {
        let provider = EchoProvider::new();
        let events: Vec<_> = provider.chat_stream(&req_with("ping")).await.unwrap().collect().await;
        assert_eq!(events.len(), 2);
        match &events[0] {
            Ok(StreamEvent::Token { text }) => assert_eq!(text, "ping"),
            other => panic!("unexpected first event: {other:?}"),
        }
        assert!(matches!(events[1], Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn provider_id_is_echo() {
        assert_eq!(EchoProvider::new().provider_id(), "echo");
    }
}
