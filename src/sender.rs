//! `LoggingSender` — the degraded-mode default `PlatformSender`.
//!
//! Concrete chat-platform clients (Telegram, Feishu, QQ) are an
//! out-of-scope external collaborator (§1). This sender logs every outgoing
//! chunk at `info` instead of delivering it anywhere, so `chat_send`,
//! `/api/chat/send` and task-run notifications all have somewhere to land
//! out of the box; a real deployment supplies its own `PlatformSender`.

use async_trait::async_trait;
use ship_domain::Result;
use ship_ingress::PlatformSender;

pub struct LoggingSender;

#[async_trait]
impl PlatformSender for LoggingSender {
    async fn send(&self, chat_key: &str, text: &str) -> Result<()> {
        tracing::info!(chat_key = %chat_key, text = %text, "chat_send (no concrete platform sender configured)");
        Ok(())
    }
}
