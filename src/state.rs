//! `AppState` — ties the runtime and task runner together for the HTTP
//! handlers. Field-grouping mirrors the teacher's `sa-gateway::state::AppState`
//! (core services / runtime / tasks), scaled down to this crate's much
//! smaller component set.
//!
//! `Runtime::build_ingress_pipeline` (ship-runtime) and `LaneScheduler` stay
//! fully wired and tested (see `ship-runtime`'s own test suite) but this
//! binary doesn't hold an `IngressPipeline` itself: nothing in spec.md §6's
//! HTTP surface feeds it an inbound `PlatformEvent` — that's the concrete
//! chat-platform connector's job, and connectors are an out-of-scope
//! external collaborator (§1). `/api/execute` drives `AgentTurn` directly,
//! synchronously, per its own spec'd contract.

use std::sync::Arc;

use ship_domain::tool::ToolCapability;
use ship_runtime::Runtime;
use ship_tasks::{TaskRunner, TaskStore};

#[derive(Clone)]
pub struct AppState {
    // ── Core runtime ─────────────────────────────────────────────────
    pub runtime: Arc<Runtime>,

    // ── Scheduled tasks ──────────────────────────────────────────────
    pub tasks: Arc<TaskRunner>,
    /// Read-only view for `GET /api/task*`; `TaskRunner` owns the store used
    /// to fire runs, this one only lists/loads definitions from disk.
    pub task_store: Arc<TaskStore>,

    // ── Capabilities granted to interactive (API) turns ────────────────
    pub interactive_capabilities: Vec<ToolCapability>,
}

/// Builds a throwaway `AppState` rooted at `root`, wired with the
/// `EchoProvider`/`LoggingSender` defaults, for the HTTP handler tests.
#[cfg(test)]
pub(crate) fn test_state(root: &std::path::Path) -> AppState {
    use ship_domain::config::RuntimeConfig;

    let provider: Arc<dyn ship_providers::LlmProvider> = Arc::new(crate::provider::EchoProvider::new());
    let sender: Arc<dyn ship_ingress::PlatformSender> = Arc::new(crate::sender::LoggingSender);
    let capabilities = vec![
        ToolCapability::Shell,
        ToolCapability::ChatSend,
        ToolCapability::ContextOps,
        ToolCapability::PinnedSkill,
    ];

    let runtime = Runtime::new(root.to_path_buf(), RuntimeConfig::default(), provider, Some(sender), capabilities.clone());
    let task_store = Arc::new(TaskStore::new(runtime.layout().clone()));
    let task_runner = Arc::new(TaskRunner::new(
        runtime.layout().clone(),
        runtime.config().task.clone(),
        runtime.config().history.clone(),
        runtime.turn().clone(),
        runtime.provider().clone(),
        runtime.egress().cloned(),
    ));

    AppState {
        runtime,
        tasks: task_runner,
        task_store,
        interactive_capabilities: capabilities,
    }
}
