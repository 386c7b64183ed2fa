//! `TaskRunner` — the cron evaluation loop, per-run audit trail and
//! notification delivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use ship_domain::config::TaskConfig;
use ship_domain::paths::run_timestamp;
use ship_domain::tool::ToolCapability;
use ship_domain::{ChatMessage, PathLayout, RequestContext, RunRecord, RunStatus, RunTrigger, TaskDefinition};
use ship_history::HistoryStore;
use ship_ingress::Egress;
use ship_providers::LlmProvider;
use ship_runtime::AgentTurn;
use tokio::sync::Mutex;

use crate::cron::{next_after, parse_tz};
use crate::store::TaskStore;

/// The only tools a task run may call: it has no interactive chat to reply
/// into (see `ToolCapability::ChatSend`'s doc comment).
const TASK_CAPABILITIES: &[ToolCapability] = &[
    ToolCapability::Shell,
    ToolCapability::ContextOps,
    ToolCapability::PinnedSkill,
];

/// Tracks in-flight run counts per task id for single-flight-style limiting.
struct ConcurrencyGuard {
    counts: Mutex<HashMap<String, Arc<AtomicUsize>>>,
}

impl ConcurrencyGuard {
    fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
        }
    }

    async fn try_acquire(&self, task_id: &str, max: usize) -> bool {
        let counter = {
            let mut map = self.counts.lock().await;
            map.entry(task_id.to_string())
                .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
                .clone()
        };
        if counter.load(Ordering::SeqCst) >= max {
            return false;
        }
        counter.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn release(&self, task_id: &str) {
        let map = self.counts.lock().await;
        if let Some(counter) = map.get(task_id) {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Count how many cron windows between `last_run_at` and `now` were missed.
/// `None` means the task has never run — treated as exactly one due window.
pub fn missed_window_count(
    cron: &str,
    tz: chrono_tz::Tz,
    last_run_at: Option<chrono::DateTime<Utc>>,
    now: &chrono::DateTime<Utc>,
    max_catchup: usize,
) -> usize {
    let anchor = match last_run_at {
        Some(t) => t,
        None => return 1,
    };
    let mut count = 0usize;
    let mut cursor = anchor;
    loop {
        match next_after(cron, &cursor, tz) {
            Some(next) if next <= *now => {
                count += 1;
                cursor = next;
                if count > max_catchup {
                    break;
                }
            }
            _ => break,
        }
    }
    count
}

/// How many runs to fire this tick, given the task's missed-window policy.
pub fn runs_to_fire(
    policy: ship_domain::MissedPolicy,
    cron: &str,
    tz: chrono_tz::Tz,
    last_run_at: Option<chrono::DateTime<Utc>>,
    now: &chrono::DateTime<Utc>,
    max_catchup: usize,
) -> usize {
    use ship_domain::MissedPolicy;
    let missed = missed_window_count(cron, tz, last_run_at, now, max_catchup);
    match policy {
        MissedPolicy::Skip => {
            if missed > 1 {
                0
            } else {
                missed
            }
        }
        MissedPolicy::RunOnce => missed.min(1),
        MissedPolicy::CatchUp => missed.min(max_catchup),
    }
}

pub struct TaskRunner {
    layout: PathLayout,
    store: TaskStore,
    task_config: TaskConfig,
    history_config: ship_domain::config::HistoryConfig,
    turn: Arc<AgentTurn>,
    provider: Arc<dyn LlmProvider>,
    egress: Option<Arc<Egress>>,
    concurrency: ConcurrencyGuard,
}

impl TaskRunner {
    pub fn new(
        layout: PathLayout,
        task_config: TaskConfig,
        history_config: ship_domain::config::HistoryConfig,
        turn: Arc<AgentTurn>,
        provider: Arc<dyn LlmProvider>,
        egress: Option<Arc<Egress>>,
    ) -> Self {
        Self {
            store: TaskStore::new(layout.clone()),
            layout,
            task_config,
            history_config,
            turn,
            provider,
            egress,
            concurrency: ConcurrencyGuard::new(),
        }
    }

    /// Run the cron evaluator forever, sleeping `task_config.tick_interval_ms`
    /// between scans. Never returns under normal operation.
    pub async fn run_forever(self: Arc<Self>) {
        let interval = std::time::Duration::from_millis(self.task_config.tick_interval_ms);
        loop {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }
    }

    /// Evaluate every task definition once; fire due runs. Exposed directly
    /// so tests don't need a sleeping background loop.
    pub async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        for task in self.store.list() {
            if !task.is_active() {
                continue;
            }
            let tz = parse_tz(task.timezone.as_deref().unwrap_or("UTC"));
            let last_run_at = self.store.last_run_at(&task.id);
            let n = runs_to_fire(
                task.missed_policy,
                &task.cron,
                tz,
                last_run_at,
                &now,
                self.task_config.max_catchup_runs,
            );
            if n == 0 {
                continue;
            }
            let max_concurrency = task.max_concurrency.unwrap_or(self.task_config.default_max_concurrency);
            for i in 0..n {
                if !self.concurrency.try_acquire(&task.id, max_concurrency).await {
                    tracing::warn!(task_id = %task.id, max = max_concurrency, "task concurrency limit reached, skipping remaining catch-up runs");
                    break;
                }
                let trigger = if last_run_at.is_none() || (n > 1 && i < n - 1) {
                    RunTrigger::CatchUp
                } else {
                    RunTrigger::Cron
                };
                self.spawn_run(task.clone(), trigger);
            }
        }
    }

    /// Fire a single run immediately, bypassing the cron schedule (used by
    /// the HTTP `run now` endpoint).
    pub async fn run_now(self: &Arc<Self>, task_id: &str) -> ship_domain::Result<()> {
        let task = self.store.load(task_id)?;
        if !self.concurrency.try_acquire(task_id, usize::MAX).await {
            return Err(ship_domain::Error::ResourceLimit(format!("task {task_id} already running")));
        }
        self.spawn_run(task, RunTrigger::Manual);
        Ok(())
    }

    fn spawn_run(self: &Arc<Self>, task: TaskDefinition, trigger: RunTrigger) {
        let this = self.clone();
        tokio::spawn(async move {
            this.run_one(task, trigger).await;
        });
    }

    async fn run_one(&self, task: TaskDefinition, trigger: RunTrigger) {
        let started_at = Utc::now();
        let timestamp = run_timestamp(started_at);
        let run_context_id = format!("task-run:{}:{}", task.id, timestamp);

        tracing::info!(task_id = %task.id, %timestamp, "starting task run");

        if let Err(e) = std::fs::create_dir_all(self.layout.task_run_dir(&task.id, &timestamp)) {
            tracing::error!(task_id = %task.id, error = %e, "failed to create task run directory");
            self.concurrency.release(&task.id).await;
            return;
        }
        if let Err(e) = std::fs::write(self.layout.task_run_input_file(&task.id, &timestamp), &task.body) {
            tracing::error!(task_id = %task.id, error = %e, "failed to write task run input.md");
            self.concurrency.release(&task.id).await;
            return;
        }

        let history = HistoryStore::new(self.layout.clone(), run_context_id.clone(), self.history_config.clone());
        if let Err(e) = history.append(&[ChatMessage::user(task.body.clone())]).await {
            self.record_failure(&task, &timestamp, started_at, &run_context_id, &e.to_string()).await;
            self.concurrency.release(&task.id).await;
            return;
        }

        let mut ctx = RequestContext::new(run_context_id.clone());
        ctx.channel = Some("task_runner".to_string());
        ctx.target_id = Some(task.context_id.clone());

        let outcome = self.turn.run(self.provider.as_ref(), &ctx, TASK_CAPABILITIES, None).await;
        let ended_at = Utc::now();

        match outcome {
            Ok(outcome) => {
                let _ = std::fs::write(self.layout.task_run_output_file(&task.id, &timestamp), &outcome.output);
                let status = if outcome.success { RunStatus::Success } else { RunStatus::Failure };
                self.finish_run(&task, &timestamp, started_at, ended_at, status, trigger, &run_context_id, &outcome.output).await;
            }
            Err(e) => {
                let message = e.to_string();
                let _ = std::fs::write(self.layout.task_run_error_file(&task.id, &timestamp), &message);
                self.finish_run(&task, &timestamp, started_at, ended_at, RunStatus::Failure, trigger, &run_context_id, &message).await;
            }
        }

        self.concurrency.release(&task.id).await;
    }

    async fn record_failure(
        &self,
        task: &TaskDefinition,
        timestamp: &str,
        started_at: chrono::DateTime<Utc>,
        run_context_id: &str,
        message: &str,
    ) {
        let _ = std::fs::write(self.layout.task_run_error_file(&task.id, timestamp), message);
        self.finish_run(task, timestamp, started_at, Utc::now(), RunStatus::Failure, RunTrigger::Cron, run_context_id, message)
            .await;
    }

    /// Write `result.md`/`run.json` and deliver the notification. Both
    /// success and failure notify; a notification failure is recorded on
    /// `run.json` but never flips the run's own status.
    #[allow(clippy::too_many_arguments)]
    async fn finish_run(
        &self,
        task: &TaskDefinition,
        timestamp: &str,
        started_at: chrono::DateTime<Utc>,
        ended_at: chrono::DateTime<Utc>,
        status: RunStatus,
        trigger: RunTrigger,
        run_context_id: &str,
        result_text: &str,
    ) {
        let _ = std::fs::write(self.layout.task_run_result_file(&task.id, timestamp), result_text);

        let notification_error = if let Some(egress) = &self.egress {
            let label = match status {
                RunStatus::Success => "completed",
                RunStatus::Failure => "failed",
            };
            let text = format!("task \"{}\" {label}:\n\n{result_text}", task.title);
            match egress.send_fallback(&task.context_id, &text).await {
                Ok(()) => None,
                Err(e) => Some(e.to_string()),
            }
        } else {
            None
        };

        let record = RunRecord {
            status,
            started_at,
            ended_at,
            trigger,
            context_id: run_context_id.to_string(),
            notification_error,
        };
        if let Ok(json) = serde_json::to_string_pretty(&record) {
            let _ = std::fs::write(self.layout.task_run_json_file(&task.id, timestamp), json);
        }

        tracing::info!(task_id = %task.id, ?status, "task run finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ship_domain::MissedPolicy;

    #[test]
    fn skip_policy_drops_all_but_a_single_missed_window() {
        let tz = chrono_tz::UTC;
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 0, 0).unwrap();
        let last = Some(Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap());
        assert_eq!(runs_to_fire(MissedPolicy::Skip, "0 * * * *", tz, last, &now, 5), 0);
    }

    #[test]
    fn run_once_fires_exactly_once() {
        let tz = chrono_tz::UTC;
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 0, 0).unwrap();
        let last = Some(Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap());
        assert_eq!(runs_to_fire(MissedPolicy::RunOnce, "0 * * * *", tz, last, &now, 5), 1);
    }

    #[test]
    fn catch_up_fires_once_per_missed_window_capped() {
        let tz = chrono_tz::UTC;
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 20, 0, 0).unwrap();
        let last = Some(Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap());
        assert_eq!(runs_to_fire(MissedPolicy::CatchUp, "0 * * * *", tz, last, &now, 5), 5);
    }

    #[test]
    fn never_run_task_counts_as_one_missed_window() {
        let tz = chrono_tz::UTC;
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 13, 0, 0).unwrap();
        assert_eq!(runs_to_fire(MissedPolicy::RunOnce, "0 * * * *", tz, None, &now, 5), 1);
    }

    #[tokio::test]
    async fn concurrency_guard_blocks_beyond_limit() {
        let guard = ConcurrencyGuard::new();
        assert!(guard.try_acquire("t", 1).await);
        assert!(!guard.try_acquire("t", 1).await);
        guard.release("t").await;
        assert!(guard.try_acquire("t", 1).await);
    }

    #[tokio::test]
    async fn full_task_run_writes_audit_trail_and_notifies() {
        use ship_domain::config::RuntimeConfig;
        use ship_ingress::PlatformSender;
        use ship_providers::testing::ScriptedProvider;
        use ship_tools::ToolRegistry;

        struct RecordingSender {
            sent: Mutex<Vec<(String, String)>>,
        }
        #[async_trait::async_trait]
        impl PlatformSender for RecordingSender {
            async fn send(&self, context_id: &str, text: &str) -> ship_domain::Result<()> {
                self.sent.lock().await.push((context_id.to_string(), text.to_string()));
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(dir.path());
        std::fs::create_dir_all(layout.task_definition_file("daily").parent().unwrap()).unwrap();
        std::fs::write(
            layout.task_definition_file("daily"),
            "---\ntitle: Daily report\ncron: \"* * * * *\"\ncontext_id: telegram-chat-1\n---\nsummarize yesterday\n",
        )
        .unwrap();

        let provider = Arc::new(ScriptedProvider::new());
        provider.push_text_reply("all done");

        let config = RuntimeConfig::default();
        let tools = Arc::new(ToolRegistry::new(layout.clone(), dir.path().to_path_buf(), config.history.clone(), config.shell.clone(), None));
        let turn = Arc::new(AgentTurn::new(layout.clone(), config.history.clone(), config.agent.clone(), tools, None));

        let sender = Arc::new(RecordingSender { sent: Mutex::new(Vec::new()) });
        let egress = Arc::new(Egress::new(sender.clone()));

        let runner = TaskRunner::new(layout.clone(), TaskConfig::default(), config.history.clone(), turn, provider, Some(egress));
        let task = TaskStore::new(layout.clone()).load("daily").unwrap();
        runner.run_one(task, RunTrigger::Manual).await;

        let run_dir = layout.task_dir("daily");
        let mut run_timestamps: Vec<_> = std::fs::read_dir(&run_dir).unwrap().flatten().collect();
        run_timestamps.retain(|e| e.file_type().unwrap().is_dir());
        assert_eq!(run_timestamps.len(), 1);
        let ts = run_timestamps[0].file_name().to_string_lossy().into_owned();

        assert!(layout.task_run_input_file("daily", &ts).exists());
        assert!(layout.task_run_output_file("daily", &ts).exists());
        assert!(layout.task_run_result_file("daily", &ts).exists());
        assert!(layout.task_run_json_file("daily", &ts).exists());
        assert!(layout.task_run_history_file("daily", &ts).exists());

        let sent = sender.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "telegram-chat-1");
        assert!(sent[0].1.contains("all done"));
    }
}
