//! `ChatMessage` — the versioned, immutable-once-appended record stored in
//! `HistoryFile`, plus the supporting `MetaFile` / `ArchiveSnapshot` types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CHAT_MESSAGE_VERSION: u32 = 1;
pub const META_FILE_VERSION: u32 = 1;
pub const ARCHIVE_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Whether an assistant message is an ordinary reply or a compaction summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Normal,
    Summary,
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Normal
    }
}

/// Where an assistant message's text originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Egress,
    Compact,
}

/// Range of superseded messages a summary message replaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub from_id: String,
    pub to_id: String,
    pub count: usize,
}

/// One block within a `ChatMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ToolInvocation {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        output: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        }
    }
}

/// A versioned, immutable-once-appended record in `HistoryFile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub v: u32,
    pub id: String,
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MessageSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_range: Option<SourceRange>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            v: CHAT_MESSAGE_VERSION,
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            parts: vec![Part::text(text)],
            metadata: None,
            kind: None,
            source: None,
            source_range: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn assistant(parts: Vec<Part>) -> Self {
        Self {
            v: CHAT_MESSAGE_VERSION,
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            parts,
            metadata: None,
            kind: Some(MessageKind::Normal),
            source: Some(MessageSource::Egress),
            source_range: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn summary(text: impl Into<String>, source_range: SourceRange) -> Self {
        Self {
            v: CHAT_MESSAGE_VERSION,
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            parts: vec![Part::text(text)],
            metadata: None,
            kind: Some(MessageKind::Summary),
            source: Some(MessageSource::Compact),
            source_range: Some(source_range),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self.kind, Some(MessageKind::Summary))
    }

    /// Concatenation of every text part, joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True if this message carries at least one tool-invocation part with
    /// no matching tool-result part in the same message (an incomplete
    /// tool-call pair, per HistoryStore.ToModelMessages §4.3).
    pub fn has_unresolved_tool_calls(&self) -> bool {
        let invoked: std::collections::HashSet<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolInvocation { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        let resolved: std::collections::HashSet<&str> = self
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolResult { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect();
        invoked.iter().any(|c| !resolved.contains(c))
    }
}

/// `{v=1, contextId, updatedAt, pinnedSkillIds, lastArchiveId?,
/// keepLastMessages?, maxInputTokensApprox?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub v: u32,
    pub context_id: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub pinned_skill_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_archive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_last_messages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_input_tokens_approx: Option<usize>,
}

impl MetaFile {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            v: META_FILE_VERSION,
            context_id: context_id.into(),
            updated_at: chrono::Utc::now(),
            pinned_skill_ids: Vec::new(),
            last_archive_id: None,
            keep_last_messages: None,
            max_input_tokens_approx: None,
        }
    }

    /// Add a pinned skill id, keeping the list deduplicated and
    /// order-preserving, per the data-model invariant.
    pub fn add_pinned_skill_id(&mut self, skill_id: impl Into<String>) {
        let skill_id = skill_id.into();
        if !self.pinned_skill_ids.contains(&skill_id) {
            self.pinned_skill_ids.push(skill_id);
        }
        self.updated_at = chrono::Utc::now();
    }

    pub fn remove_pinned_skill_id(&mut self, skill_id: &str) {
        self.pinned_skill_ids.retain(|s| s != skill_id);
        self.updated_at = chrono::Utc::now();
    }

    pub fn set_pinned_skill_ids(&mut self, ids: Vec<String>) {
        let mut seen = std::collections::HashSet::new();
        self.pinned_skill_ids = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        self.updated_at = chrono::Utc::now();
    }
}

/// `{v=1, contextId, archivedAt, messages}`, written atomically under the
/// context's archive directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    pub v: u32,
    pub context_id: String,
    pub archived_at: chrono::DateTime<chrono::Utc>,
    pub messages: Vec<ChatMessage>,
}

impl ArchiveSnapshot {
    pub fn new(context_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            v: ARCHIVE_SNAPSHOT_VERSION,
            context_id: context_id.into(),
            archived_at: chrono::Utc::now(),
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_only_text_parts() {
        let msg = ChatMessage::assistant(vec![
            Part::text("hello"),
            Part::ToolInvocation {
                call_id: "c1".into(),
                tool_name: "shell".into(),
                arguments: serde_json::json!({}),
            },
            Part::text("world"),
        ]);
        assert_eq!(msg.text(), "hello\nworld");
    }

    #[test]
    fn detects_unresolved_tool_calls() {
        let msg = ChatMessage::assistant(vec![Part::ToolInvocation {
            call_id: "c1".into(),
            tool_name: "shell".into(),
            arguments: serde_json::json!({}),
        }]);
        assert!(msg.has_unresolved_tool_calls());

        let resolved = ChatMessage::assistant(vec![
            Part::ToolInvocation {
                call_id: "c1".into(),
                tool_name: "shell".into(),
                arguments: serde_json::json!({}),
            },
            Part::ToolResult {
                call_id: "c1".into(),
                tool_name: "shell".into(),
                output: serde_json::json!({"ok": true}),
                is_error: false,
            },
        ]);
        assert!(!resolved.has_unresolved_tool_calls());
    }

    #[test]
    fn meta_pinned_skill_ids_dedupe_and_preserve_order() {
        let mut meta = MetaFile::new("api:chat:1");
        meta.add_pinned_skill_id("a");
        meta.add_pinned_skill_id("b");
        meta.add_pinned_skill_id("a");
        assert_eq!(meta.pinned_skill_ids, vec!["a", "b"]);
    }

    #[test]
    fn chat_message_roundtrips_through_json() {
        let msg = ChatMessage::user("hi there");
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text(), "hi there");
        assert_eq!(back.role, Role::User);
    }
}
