//! `LanguageModel` — the external collaborator `AgentTurn` drives.
//!
//! Concrete provider clients (OpenAI-compatible HTTP, Anthropic, etc.) are
//! explicitly out of scope; this crate only defines the capability boundary
//! plus the in-memory test double used by the runtime's own test suite.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ship_domain::{Error, Result, ToolCall, ToolDefinition};

use crate::capability::LlmCapabilities;
use crate::message::ModelMessage;
use crate::stream::{BoxStream, Usage};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ModelMessage>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The `LanguageModel` capability: produces tool-call steps from a
/// conversation. `AgentTurn` drives this trait object exclusively through
/// `chat_stream`; `chat` exists for non-streaming internal uses
/// (compaction summarisation).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    async fn chat_stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<crate::stream::StreamEvent>>>;

    fn capabilities(&self) -> &LlmCapabilities;

    fn provider_id(&self) -> &str;
}

/// Convenience used by callers that only have an owned request.
pub async fn chat_stream_owned(
    provider: &dyn LlmProvider,
    req: ChatRequest,
) -> Result<BoxStream<'static, Result<crate::stream::StreamEvent>>> {
    provider.chat_stream(&req).await
}

pub fn context_overflow_error(message: impl Into<String>) -> Error {
    Error::Provider(message.into())
}
