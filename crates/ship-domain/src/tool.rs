//! Tool wire types shared between the LLM provider boundary, the tool
//! registry and history persistence.

use serde::{Deserialize, Serialize};

/// A callable tool's name, description and JSON-schema parameters, as
/// advertised to the `LanguageModel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One invocation the model asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// The capability group a tool executor belongs to. Used by `ToolRegistry`
/// to decide which executors a given `RequestContext` may call (e.g. a
/// task-runner turn has no interactive chat to `chat_send` back to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    Shell,
    ChatSend,
    ContextOps,
    PinnedSkill,
}
