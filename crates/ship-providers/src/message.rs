//! `ModelMessage` — the wire shape fed to and read back from a
//! `LanguageModel`, distinct from the persisted `ChatMessage` (which has no
//! `system`/`tool` role and no streaming concerns).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: ModelContent,
}

impl ModelMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::System,
            content: ModelContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            content: ModelContent::Text(text.into()),
        }
    }

    pub fn assistant_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: ModelRole::Assistant,
            content: ModelContent::Parts(parts),
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: ModelRole::Tool,
            content: ModelContent::Parts(vec![ContentPart::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }]),
        }
    }

    /// First text part, or the whole string if content is plain text.
    pub fn text(&self) -> String {
        match &self.content {
            ModelContent::Text(t) => t.clone(),
            ModelContent::Parts(parts) => parts
                .iter()
                .find_map(|p| match p {
                    ContentPart::Text { text } => Some(text.clone()),
                    _ => None,
                })
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_helper_covers_both_content_shapes() {
        assert_eq!(ModelMessage::user("hi").text(), "hi");
        let msg = ModelMessage::assistant_parts(vec![
            ContentPart::Text { text: "hello".into() },
            ContentPart::ToolUse {
                id: "1".into(),
                name: "shell".into(),
                input: serde_json::json!({}),
            },
        ]);
        assert_eq!(msg.text(), "hello");
    }
}
