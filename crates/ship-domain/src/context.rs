//! Ambient per-turn context and inbound platform events.
//!
//! Carried explicitly as a value type through call chains and into every
//! tool invocation — never via thread-locals (see design notes on the
//! source's thread-local-storage analog).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `{requestId, contextId, channel?, targetId?, actorId?, messageId?, threadId?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub request_id: String,
    pub context_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl RequestContext {
    pub fn new(context_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            context_id: context_id.into(),
            channel: None,
            target_id: None,
            actor_id: None,
            message_id: None,
            thread_id: None,
        }
    }

    /// `SMA_CTX_*` environment variables derived from this context, passed
    /// to shell children so nested invocations can reach the local server.
    pub fn as_env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("SMA_CTX_REQUEST_ID".to_string(), self.request_id.clone()),
            ("SMA_CTX_CONTEXT_ID".to_string(), self.context_id.clone()),
        ];
        if let Some(channel) = &self.channel {
            vars.push(("SMA_CTX_CHANNEL".to_string(), channel.clone()));
        }
        if let Some(target_id) = &self.target_id {
            vars.push(("SMA_CTX_TARGET_ID".to_string(), target_id.clone()));
        }
        if let Some(actor_id) = &self.actor_id {
            vars.push(("SMA_CTX_ACTOR_ID".to_string(), actor_id.clone()));
        }
        if let Some(thread_id) = &self.thread_id {
            vars.push(("SMA_CTX_THREAD_ID".to_string(), thread_id.clone()));
        }
        vars
    }
}

/// Raw event handed to the ingress pipeline by a (not-in-scope) platform
/// adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub channel: Channel,
    pub target_id: String,
    #[serde(default)]
    pub thread_id: Option<u64>,
    pub target_type: TargetType,
    pub actor_id: String,
    #[serde(default)]
    pub actor_label: Option<String>,
    pub message_id: String,
    pub body: String,
    #[serde(default)]
    pub mentions_me: bool,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Telegram,
    Feishu,
    Qq,
    Api,
    TaskRunner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Direct,
    Group,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_include_required_prefix() {
        let mut ctx = RequestContext::new("api:chat:7");
        ctx.channel = Some("api".into());
        let vars = ctx.as_env_vars();
        assert!(vars.iter().all(|(k, _)| k.starts_with("SMA_CTX_")));
        assert!(vars.iter().any(|(k, v)| k == "SMA_CTX_CONTEXT_ID" && v == "api:chat:7"));
    }
}
