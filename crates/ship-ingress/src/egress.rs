//! Egress — the `chat_send` tool's semantics: escape normalisation, chunking
//! at a platform cap, and the fallback sender for turns that never call
//! `chat_send`.

use async_trait::async_trait;
use ship_domain::Result;

/// The concrete chat-platform client. Out of scope (§1); the core only
/// drives this narrow capability.
#[async_trait]
pub trait PlatformSender: Send + Sync {
    async fn send(&self, chat_key: &str, text: &str) -> Result<()>;
}

const TELEGRAM_CHUNK_CAP: usize = 3_900;
const DEFAULT_CHUNK_CAP: usize = 3_900;

fn chunk_cap_for(chat_key: &str) -> usize {
    if chat_key.starts_with("telegram-") {
        TELEGRAM_CHUNK_CAP
    } else {
        DEFAULT_CHUNK_CAP
    }
}

/// If `text` has no real line breaks or tabs but does contain the two-byte
/// escape sequences `\n`, `\r`, `\t`, treat those as the model's stand-in
/// for real control characters and unescape them.
pub fn normalize_escapes(text: &str) -> String {
    if text.contains('\n') || text.contains('\r') || text.contains('\t') {
        return text.to_string();
    }
    if !text.contains("\\n") && !text.contains("\\r") && !text.contains("\\t") {
        return text.to_string();
    }
    text.replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\r", "\n")
        .replace("\\t", "\t")
}

/// Greedily pack lines into chunks no longer than `cap`, preferring to
/// break on a newline boundary. A single line longer than `cap` is
/// hard-split.
pub fn chunk_message(text: &str, cap: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if line.len() > cap {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut rest = line;
            while rest.len() > cap {
                let mut cut = cap;
                while cut > 0 && !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                chunks.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            if !rest.is_empty() {
                current.push_str(rest);
            }
            continue;
        }
        if current.len() + line.len() > cap {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

pub struct Egress {
    sender: std::sync::Arc<dyn PlatformSender>,
}

impl Egress {
    pub fn new(sender: std::sync::Arc<dyn PlatformSender>) -> Self {
        Self { sender }
    }

    /// `chat_send(chatKey, text)` — the only way the agent replies.
    pub async fn chat_send(&self, chat_key: &str, text: &str) -> Result<()> {
        let normalized = normalize_escapes(text);
        let cap = chunk_cap_for(chat_key);
        for chunk in chunk_message(&normalized, cap) {
            self.sender.send(chat_key, &chunk).await?;
        }
        Ok(())
    }

    /// Used when a turn's `onStep` captured assistant text but the turn
    /// never called `chat_send` itself. Every contextId participates,
    /// including `api:chat:*`, since a synchronous `/api/execute` caller
    /// has no other channel through which to observe assistant text.
    pub async fn send_fallback(&self, context_id: &str, text: &str) -> Result<()> {
        self.chat_send(context_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PlatformSender for RecordingSender {
        async fn send(&self, chat_key: &str, text: &str) -> Result<()> {
            self.sent.lock().push((chat_key.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[test]
    fn unescapes_literal_sequences_when_no_real_breaks() {
        assert_eq!(normalize_escapes("line1\\nline2"), "line1\nline2");
        assert_eq!(normalize_escapes("already\nreal"), "already\nreal");
        assert_eq!(normalize_escapes("plain text"), "plain text");
    }

    #[test]
    fn chunk_message_prefers_newline_breakpoints() {
        let text = "a".repeat(10) + "\n" + &"b".repeat(10) + "\n" + &"c".repeat(10);
        let chunks = chunk_message(&text, 15);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with('\n'));
    }

    #[test]
    fn chunk_message_hard_splits_oversized_single_line() {
        let text = "x".repeat(50);
        let chunks = chunk_message(&text, 20);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 20));
    }

    #[tokio::test]
    async fn chat_send_delivers_each_chunk_in_order() {
        let sender = std::sync::Arc::new(RecordingSender { sent: Mutex::new(Vec::new()) });
        let egress = Egress::new(sender.clone());
        egress.chat_send("api:chat:1", "hello\nworld").await.unwrap();
        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "hello\nworld");
    }
}
