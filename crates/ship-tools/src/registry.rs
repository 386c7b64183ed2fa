//! `ToolRegistry` — builds the tool definitions offered to the model and
//! dispatches a model-issued tool call to the matching executor.
//!
//! Executors are grouped by the capability they require
//! (`ship_domain::tool::ToolCapability`); `definitions()` filters by the
//! capability set a given turn is allowed, so e.g. a task-runner turn never
//! sees `chat_send`.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use ship_domain::config::{HistoryConfig, ShellConfig};
use ship_domain::tool::{ToolCapability, ToolDefinition};
use ship_domain::{PathLayout, RequestContext};
use ship_history::HistoryStore;
use ship_ingress::Egress;
use ship_shell::{
    close_session, exec_command, write_stdin, CloseSessionRequest, ExecCommandRequest,
    ShellSessionRegistry, WriteStdinRequest,
};

use crate::skill::SkillCatalog;

pub struct ToolRegistry {
    layout: PathLayout,
    project_root: PathBuf,
    history_config: HistoryConfig,
    shell: Arc<ShellSessionRegistry>,
    egress: Option<Arc<Egress>>,
    skills: SkillCatalog,
}

impl ToolRegistry {
    pub fn new(
        layout: PathLayout,
        project_root: PathBuf,
        history_config: HistoryConfig,
        shell_config: ShellConfig,
        egress: Option<Arc<Egress>>,
    ) -> Self {
        let skills_dir = layout.skills_dir();
        Self {
            skills: SkillCatalog::load(&skills_dir),
            layout,
            project_root,
            history_config,
            shell: Arc::new(ShellSessionRegistry::new(shell_config)),
            egress,
        }
    }

    pub fn shell_registry(&self) -> &ShellSessionRegistry {
        &self.shell
    }

    pub fn skills(&self) -> &SkillCatalog {
        &self.skills
    }

    fn history_for(&self, context_id: &str) -> HistoryStore {
        HistoryStore::new(self.layout.clone(), context_id.to_string(), self.history_config.clone())
    }

    /// Tool definitions offered to the model, filtered to `capabilities`.
    pub fn definitions(&self, capabilities: &[ToolCapability]) -> Vec<ToolDefinition> {
        let mut defs = Vec::new();
        let has = |cap: ToolCapability| capabilities.contains(&cap);

        if has(ToolCapability::Shell) {
            defs.push(ToolDefinition {
                name: "exec_command".into(),
                description: "Run a shell command. Returns output inline, or a sessionId to \
                    poll/continue if the command is still running or output was truncated."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "cmd": { "type": "string", "description": "Command to execute" },
                        "workdir": { "type": "string", "description": "Working directory, relative to the project root unless absolute" },
                        "shell": { "type": "string", "description": "Shell binary (default: sh)" },
                        "login": { "type": "boolean", "description": "Run as a login shell (default: true)" },
                        "yield_ms": { "type": "integer", "description": "Milliseconds to wait for the command to finish before backgrounding it (default 10000)" },
                        "max_output_tokens": { "type": "integer", "description": "Caps the returned page of output to roughly this many tokens" }
                    },
                    "required": ["cmd"]
                }),
            });
            defs.push(ToolDefinition {
                name: "write_stdin".into(),
                description: "Write to a backgrounded session's stdin, or poll it with an empty \
                    string to drain more output."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "chars": { "type": "string", "description": "Text to write; empty to poll" },
                        "yield_ms": { "type": "integer", "description": "Milliseconds to wait for new output (default 250)" },
                        "max_output_tokens": { "type": "integer" }
                    },
                    "required": ["session_id"]
                }),
            });
            defs.push(ToolDefinition {
                name: "close_session".into(),
                description: "Kill and forget a backgrounded session.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "session_id": { "type": "string" },
                        "force": { "type": "boolean" }
                    },
                    "required": ["session_id"]
                }),
            });
        }

        if has(ToolCapability::ChatSend) {
            defs.push(ToolDefinition {
                name: "chat_send".into(),
                description: "Send a message back to the user on the current chat platform. \
                    This is the only way to reply; plain assistant text is not delivered."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" }
                    },
                    "required": ["text"]
                }),
            });
        }

        if has(ToolCapability::ContextOps) {
            defs.push(ToolDefinition {
                name: "context_set_pinned_skills".into(),
                description: "Replace the set of skills pinned into this conversation's system prompt.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "skillIds": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ["skillIds"]
                }),
            });
        }

        if has(ToolCapability::PinnedSkill) {
            defs.push(ToolDefinition {
                name: "pin_skill".into(),
                description: "Pin a skill by name so its instructions are injected into future turns of this conversation.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" }
                    },
                    "required": ["name"]
                }),
            });
            defs.push(ToolDefinition {
                name: "unpin_skill".into(),
                description: "Remove a previously pinned skill.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" }
                    },
                    "required": ["name"]
                }),
            });
        }

        defs
    }

    /// Dispatch a tool call. Returns `(result_content, is_error)`.
    pub async fn dispatch(&self, ctx: &RequestContext, tool_name: &str, arguments: &Value) -> (String, bool) {
        match tool_name {
            "exec_command" => self.dispatch_exec_command(ctx, arguments).await,
            "write_stdin" => self.dispatch_write_stdin(arguments).await,
            "close_session" => self.dispatch_close_session(arguments).await,
            "chat_send" => self.dispatch_chat_send(ctx, arguments).await,
            "context_set_pinned_skills" => self.dispatch_set_pinned_skills(ctx, arguments),
            "pin_skill" => self.dispatch_pin_skill(ctx, arguments),
            "unpin_skill" => self.dispatch_unpin_skill(ctx, arguments),
            other => (format!("unknown tool: {other}"), true),
        }
    }

    async fn dispatch_exec_command(&self, ctx: &RequestContext, arguments: &Value) -> (String, bool) {
        let req: ExecCommandRequest = match serde_json::from_value(arguments.clone()) {
            Ok(r) => r,
            Err(e) => return (format!("invalid exec_command arguments: {e}"), true),
        };
        match exec_command(&self.shell, ctx, &self.project_root, req).await {
            Ok(resp) => (serde_json::to_string_pretty(&resp).unwrap_or_default(), false),
            Err(e) => (format!("exec_command failed: {e}"), true),
        }
    }

    async fn dispatch_write_stdin(&self, arguments: &Value) -> (String, bool) {
        let req: WriteStdinRequest = match serde_json::from_value(arguments.clone()) {
            Ok(r) => r,
            Err(e) => return (format!("invalid write_stdin arguments: {e}"), true),
        };
        match write_stdin(&self.shell, req).await {
            Ok(resp) => (serde_json::to_string_pretty(&resp).unwrap_or_default(), false),
            Err(e) => (format!("write_stdin failed: {e}"), true),
        }
    }

    async fn dispatch_close_session(&self, arguments: &Value) -> (String, bool) {
        let req: CloseSessionRequest = match serde_json::from_value(arguments.clone()) {
            Ok(r) => r,
            Err(e) => return (format!("invalid close_session arguments: {e}"), true),
        };
        let resp = close_session(&self.shell, req).await;
        (serde_json::to_string_pretty(&resp).unwrap_or_default(), false)
    }

    async fn dispatch_chat_send(&self, ctx: &RequestContext, arguments: &Value) -> (String, bool) {
        let Some(egress) = &self.egress else {
            return ("chat_send is unavailable in this context".to_string(), true);
        };
        let text = match arguments.get("text").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => return ("chat_send requires a \"text\" argument".to_string(), true),
        };
        match egress.chat_send(&ctx.context_id, text).await {
            Ok(()) => ("sent".to_string(), false),
            Err(e) => (format!("chat_send failed: {e}"), true),
        }
    }

    fn dispatch_set_pinned_skills(&self, ctx: &RequestContext, arguments: &Value) -> (String, bool) {
        let ids: Vec<String> = match arguments.get("skillIds").and_then(|v| v.as_array()) {
            Some(arr) => arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            None => return ("context_set_pinned_skills requires a \"skillIds\" array".to_string(), true),
        };
        let store = self.history_for(&ctx.context_id);
        match store.set_pinned_skill_ids(ids) {
            Ok(meta) => (serde_json::to_string_pretty(&meta.pinned_skill_ids).unwrap_or_default(), false),
            Err(e) => (format!("failed to set pinned skills: {e}"), true),
        }
    }

    fn dispatch_pin_skill(&self, ctx: &RequestContext, arguments: &Value) -> (String, bool) {
        let name = match arguments.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return ("pin_skill requires a \"name\" argument".to_string(), true),
        };
        if !self.skills.exists(name) {
            return (format!("unknown skill: {name}"), true);
        }
        let store = self.history_for(&ctx.context_id);
        match store.add_pinned_skill_id(name) {
            Ok(_) => (format!("pinned {name}"), false),
            Err(e) => (format!("failed to pin skill: {e}"), true),
        }
    }

    fn dispatch_unpin_skill(&self, ctx: &RequestContext, arguments: &Value) -> (String, bool) {
        let name = match arguments.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return ("unpin_skill requires a \"name\" argument".to_string(), true),
        };
        let store = self.history_for(&ctx.context_id);
        match store.remove_pinned_skill_id(name) {
            Ok(_) => (format!("unpinned {name}"), false),
            Err(e) => (format!("failed to unpin skill: {e}"), true),
        }
    }
}
