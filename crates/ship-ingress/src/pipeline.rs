//! `IngressPipeline` — turns a `PlatformEvent` into a persisted user message
//! and an enqueued turn, or silently audits it.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use ship_domain::{ChatMessage, PathLayout, RequestContext, Result, TargetType};
use ship_domain::config::HistoryConfig;
use ship_history::HistoryStore;

use crate::dedupe::DedupeStore;
use crate::mapping::{context_id_for, effective_actor_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    Busy,
}

/// Implemented by `LaneScheduler` (ship-runtime); kept as a trait here so
/// `IngressPipeline` never holds a back-pointer to the runtime.
#[async_trait]
pub trait TurnEnqueuer: Send + Sync {
    async fn enqueue(&self, ctx: RequestContext) -> Result<EnqueueOutcome>;
}

#[derive(Debug, Clone)]
pub struct IngressConfig {
    pub group_requires_mention_or_command: bool,
    pub thread_initiator_gating: bool,
    pub dedupe_window_minutes: i64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            group_requires_mention_or_command: true,
            thread_initiator_gating: false,
            dedupe_window_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressOutcome {
    Enqueued,
    AuditOnly { reason: String },
    Busy,
    Duplicate,
}

pub struct IngressPipeline<E: TurnEnqueuer> {
    layout: PathLayout,
    history_config: HistoryConfig,
    config: IngressConfig,
    dedupe: DedupeStore,
    thread_initiators: Mutex<HashMap<String, String>>,
    enqueuer: E,
}

fn is_command(body: &str) -> bool {
    body.trim_start().starts_with('/')
}

impl<E: TurnEnqueuer> IngressPipeline<E> {
    pub fn new(layout: PathLayout, history_config: HistoryConfig, config: IngressConfig, enqueuer: E) -> Self {
        let dedupe = DedupeStore::at_path(config.dedupe_window_minutes, layout.dedupe_file());
        Self {
            layout,
            history_config,
            config,
            dedupe,
            thread_initiators: Mutex::new(HashMap::new()),
            enqueuer,
        }
    }

    pub async fn handle(&self, event: ship_domain::PlatformEvent) -> Result<IngressOutcome> {
        let context_id = context_id_for(&event);

        if self.dedupe.is_duplicate(&context_id, &event.message_id) {
            return Ok(IngressOutcome::Duplicate);
        }

        if event.target_type == TargetType::Group && self.config.group_requires_mention_or_command {
            let command = is_command(&event.body);
            if !event.mentions_me && !command {
                return Ok(IngressOutcome::AuditOnly {
                    reason: "group message without mention or command".to_string(),
                });
            }

            if self.config.thread_initiator_gating && !command {
                let mut initiators = self.thread_initiators.lock();
                match initiators.get(&context_id) {
                    Some(initiator) if initiator != &event.actor_id => {
                        return Ok(IngressOutcome::AuditOnly {
                            reason: "non-initiator speaker in gated thread".to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        initiators.insert(context_id.clone(), event.actor_id.clone());
                    }
                }
            }
        }

        let store = HistoryStore::new(self.layout.clone(), context_id.clone(), self.history_config.clone());
        store.append(&[ChatMessage::user(event.body.clone())]).await?;

        let mut ctx = RequestContext::new(context_id);
        ctx.channel = Some(channel_label(&event.channel));
        ctx.target_id = Some(event.target_id.clone());
        ctx.actor_id = Some(effective_actor_id(&event).to_string());
        ctx.message_id = Some(event.message_id.clone());
        if let Some(thread_id) = event.thread_id {
            ctx.thread_id = Some(thread_id.to_string());
        }

        match self.enqueuer.enqueue(ctx).await? {
            EnqueueOutcome::Accepted => Ok(IngressOutcome::Enqueued),
            EnqueueOutcome::Busy => Ok(IngressOutcome::Busy),
        }
    }
}

fn channel_label(channel: &ship_domain::Channel) -> String {
    use ship_domain::Channel::*;
    match channel {
        Telegram => "telegram",
        Feishu => "feishu",
        Qq => "qq",
        Api => "api",
        TaskRunner => "task-runner",
    }
    .to_string()
}
