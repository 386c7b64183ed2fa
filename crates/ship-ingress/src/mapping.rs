//! `PlatformEvent` → `(contextId, userText, meta)` per the deterministic
//! per-channel naming convention.

use ship_domain::{Channel, PlatformEvent, TargetType};

pub fn context_id_for(event: &PlatformEvent) -> String {
    match event.channel {
        Channel::Telegram => match event.thread_id {
            Some(thread_id) if thread_id > 0 => {
                format!("telegram-chat-{}-topic-{}", event.target_id, thread_id)
            }
            _ => format!("telegram-chat-{}", event.target_id),
        },
        Channel::Feishu => format!("feishu-chat-{}", event.target_id),
        Channel::Qq => {
            let kind = match event.target_type {
                TargetType::Direct => "direct",
                TargetType::Group => "group",
            };
            format!("qq-{kind}-{}", event.target_id)
        }
        Channel::Api => format!("api:chat:{}", event.target_id),
        Channel::TaskRunner => event.target_id.clone(),
    }
}

/// `task-run:<taskId>:<timestamp>` — built directly by `TaskRunner`, not
/// derived from a `PlatformEvent`.
pub fn task_run_context_id(task_id: &str, timestamp: &str) -> String {
    format!("task-run:{task_id}:{timestamp}")
}

/// API actors default to `"api"` when unset upstream.
pub fn effective_actor_id(event: &PlatformEvent) -> &str {
    if event.actor_id.is_empty() {
        "api"
    } else {
        &event.actor_id
    }
}
