//! An in-memory `LlmProvider` test double, scripted per call. Mirrors the
//! pack's convention of hand-written fakes over a mocking crate.

use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;
use ship_domain::Result;
use std::collections::VecDeque;

use crate::capability::LlmCapabilities;
use crate::message::ModelMessage;
use crate::stream::{BoxStream, StreamEvent};
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// Queues of scripted responses, consumed one call at a time. Panics (via
/// `expect`) if a test drives more calls than it scripted — that is
/// intentional: an unscripted call means the test's assumption about the
/// turn loop's call count is wrong.
pub struct ScriptedProvider {
    id: String,
    capabilities: LlmCapabilities,
    stream_script: Mutex<VecDeque<Vec<StreamEvent>>>,
    chat_script: Mutex<VecDeque<ChatResponse>>,
    pub calls: Mutex<Vec<Vec<ModelMessage>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            id: "scripted-test-provider".to_string(),
            capabilities: LlmCapabilities::default(),
            stream_script: Mutex::new(VecDeque::new()),
            chat_script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Schedule the next `chat_stream` call to emit this event sequence.
    pub fn push_stream(&self, events: Vec<StreamEvent>) {
        self.stream_script.lock().push_back(events);
    }

    /// Convenience: schedule a plain-text reply with no tool calls.
    pub fn push_text_reply(&self, text: impl Into<String>) {
        let text = text.into();
        self.push_stream(vec![
            StreamEvent::Token { text: text.clone() },
            StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".to_string()),
            },
        ]);
    }

    /// Schedule a reply that requests one tool call.
    pub fn push_tool_call(&self, call_id: &str, tool_name: &str, arguments: serde_json::Value) {
        self.push_stream(vec![
            StreamEvent::ToolCallStarted {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
            },
            StreamEvent::ToolCallFinished {
                call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                arguments,
            },
            StreamEvent::Done {
                usage: None,
                finish_reason: Some("tool_calls".to_string()),
            },
        ]);
    }

    /// Schedule the next call to fail with a context-overflow-shaped error.
    pub fn push_context_overflow(&self) {
        self.push_stream(vec![StreamEvent::Error {
            message: "maximum context length exceeded".to_string(),
        }]);
    }

    pub fn push_chat(&self, resp: ChatResponse) {
        self.chat_script.lock().push_back(resp);
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        self.calls.lock().push(req.messages.clone());
        self.chat_script
            .lock()
            .pop_front()
            .ok_or_else(|| ship_domain::Error::Provider("no scripted chat() response".into()))
    }

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        self.calls.lock().push(req.messages.clone());
        let events = self
            .stream_script
            .lock()
            .pop_front()
            .ok_or_else(|| ship_domain::Error::Provider("no scripted chat_stream() response".into()))?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}
