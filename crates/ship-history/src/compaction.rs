//! The compaction algorithm proper: partitioning, LLM summarisation, and
//! the synthetic summary message. The two-phase lock/commit orchestration
//! lives in `store.rs`; this module is pure-ish (summarisation is the one
//! I/O call, isolated so it runs outside the file lock per spec.md §4.3).

use ship_domain::{ChatMessage, Role, SourceRange};
use ship_providers::{ChatRequest, LlmProvider, ModelMessage};

/// Split `messages` into `(older, kept)` where `kept` is the last
/// `keep_last` messages and `older` is everything before it.
pub fn partition(messages: &[ChatMessage], keep_last: usize) -> (&[ChatMessage], &[ChatMessage]) {
    if messages.len() <= keep_last {
        return (&messages[0..0], messages);
    }
    let split_at = messages.len() - keep_last;
    (&messages[..split_at], &messages[split_at..])
}

/// `ceil((systemText.length + JSON(messages).length) / 3)`.
pub fn estimate_tokens(system: &str, messages: &[ChatMessage]) -> usize {
    let json_len = serde_json::to_string(messages).map(|s| s.len()).unwrap_or(0);
    let chars = system.len() + json_len;
    chars.div_ceil(3)
}

/// Flatten `older` into a single transcript string for the summarisation
/// prompt, truncated to `cap` chars keeping the tail (the most recent
/// context is more relevant to "what's still open").
pub fn build_conversation_text(older: &[ChatMessage], cap: usize) -> String {
    let mut buf = String::new();
    for msg in older {
        let label = match msg.role {
            Role::User => "User",
            Role::Assistant if msg.is_summary() => "PriorSummary",
            Role::Assistant => "Assistant",
        };
        buf.push_str(label);
        buf.push_str(": ");
        buf.push_str(&msg.text());
        buf.push('\n');
    }
    if buf.len() > cap {
        let start = buf.len() - cap;
        // back off to a char boundary
        let mut start = start;
        while start < buf.len() && !buf.is_char_boundary(start) {
            start += 1;
        }
        buf = buf[start..].to_string();
    }
    buf
}

const SUMMARY_FALLBACK: &str = "summary generation failed; older history dropped";

/// Summarise `older` via the LLM (non-streaming), falling back to a lossy
/// marker on failure rather than blocking the turn on a broken provider.
pub async fn generate_summary(
    provider: &dyn LlmProvider,
    older: &[ChatMessage],
    input_cap: usize,
) -> String {
    let transcript = build_conversation_text(older, input_cap);
    let instruction = "You are a conversation summarizer. Summarize the following \
        conversation history into a concise (300-800 word) summary that preserves: \
        facts learned, user preferences, decisions made, open items/threads, and \
        tool/process state. Write in present tense, omit pleasantries.";

    let req = ChatRequest {
        messages: vec![
            ModelMessage::system(instruction),
            ModelMessage::user(transcript),
        ],
        tools: vec![],
        temperature: Some(0.1),
        max_tokens: Some(2000),
        model: None,
    };

    match provider.chat(&req).await {
        Ok(resp) if !resp.content.trim().is_empty() => resp.content,
        Ok(_) => SUMMARY_FALLBACK.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "compaction summarisation failed, using fallback marker");
            SUMMARY_FALLBACK.to_string()
        }
    }
}

pub fn summary_message(text: String, older: &[ChatMessage]) -> ChatMessage {
    let source_range = SourceRange {
        from_id: older.first().map(|m| m.id.clone()).unwrap_or_default(),
        to_id: older.last().map(|m| m.id.clone()).unwrap_or_default(),
        count: older.len(),
    };
    ChatMessage::summary(text, source_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("msg {i}"))
                } else {
                    ChatMessage::assistant(vec![ship_domain::Part::text(format!("reply {i}"))])
                }
            })
            .collect()
    }

    #[test]
    fn partition_keeps_last_n() {
        let messages = make(10);
        let (older, kept) = partition(&messages, 4);
        assert_eq!(older.len(), 6);
        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].text(), "msg 6");
    }

    #[test]
    fn partition_no_op_when_fewer_than_keep() {
        let messages = make(3);
        let (older, kept) = partition(&messages, 10);
        assert!(older.is_empty());
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn conversation_text_truncates_keeping_tail() {
        let messages = make(100);
        let text = build_conversation_text(&messages, 50);
        assert!(text.len() <= 50);
        assert!(text.contains("msg 98") || text.contains("reply 99"));
    }

    #[test]
    fn source_range_spans_first_to_last() {
        let messages = make(4);
        let msg = summary_message("summary text".into(), &messages);
        let range = msg.source_range.unwrap();
        assert_eq!(range.count, 4);
        assert_eq!(range.from_id, messages[0].id);
        assert_eq!(range.to_id, messages[3].id);
    }
}
