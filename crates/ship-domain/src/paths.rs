//! `PathLayout` — pure mapping from `(rootPath, contextId, taskId, timestamp)`
//! to canonical on-disk locations under `<root>/.ship/`.

use std::path::{Path, PathBuf};

/// Canonical on-disk layout rooted at `<root>/.ship/`.
///
/// Every method here is a pure function of its inputs: no I/O, no state.
#[derive(Debug, Clone)]
pub struct PathLayout {
    root: PathBuf,
}

impl PathLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ship_dir(&self) -> PathBuf {
        self.root.join(".ship")
    }

    pub fn agent_md(&self) -> PathBuf {
        self.ship_dir().join("agent.md")
    }

    pub fn config_file(&self) -> PathBuf {
        self.ship_dir().join("ship.json")
    }

    pub fn log_file(&self, date: &str) -> PathBuf {
        self.ship_dir().join("logs").join(format!("{date}.jsonl"))
    }

    pub fn public_dir(&self) -> PathBuf {
        self.ship_dir().join("public")
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.ship_dir().join("skills")
    }

    /// Persisted `(contextId, messageId)` dedupe set — survives a process
    /// restart so a platform redelivery inside the dedupe window is still
    /// caught (§4.5).
    pub fn dedupe_file(&self) -> PathBuf {
        self.ship_dir().join("dedupe.json")
    }

    pub fn cache_dir(&self, channel: &str) -> PathBuf {
        self.ship_dir().join("cache").join(encode_segment(channel))
    }

    pub fn approval_file(&self, id: &str) -> PathBuf {
        self.ship_dir()
            .join("approvals")
            .join(format!("{}.json", encode_segment(id)))
    }

    /// `context/<encodedContextId>/messages/`
    pub fn context_messages_dir(&self, context_id: &str) -> PathBuf {
        self.ship_dir()
            .join("context")
            .join(encode_context_id(context_id))
            .join("messages")
    }

    /// Every `HistoryStore` path resolves through this pair of methods, so a
    /// `task-run:<taskId>:<timestamp>` context id (the shape `TaskRunner`
    /// constructs for each run) is redirected into the run's own directory
    /// instead of a generic `context/` one — §4.7's run-directory layout
    /// expects `task/<taskId>/<timestamp>/history.jsonl`, not a second copy
    /// under `context/`.
    pub fn history_file(&self, context_id: &str) -> PathBuf {
        match task_run_parts(context_id) {
            Some((task_id, timestamp)) => self.task_run_history_file(&task_id, &timestamp),
            None => self.context_messages_dir(context_id).join("history.jsonl"),
        }
    }

    pub fn meta_file(&self, context_id: &str) -> PathBuf {
        match task_run_parts(context_id) {
            Some((task_id, timestamp)) => self.task_run_dir(&task_id, &timestamp).join("meta.json"),
            None => self.context_messages_dir(context_id).join("meta.json"),
        }
    }

    pub fn history_lock_file(&self, context_id: &str) -> PathBuf {
        match task_run_parts(context_id) {
            Some((task_id, timestamp)) => self.task_run_dir(&task_id, &timestamp).join(".history.lock"),
            None => self.context_messages_dir(context_id).join(".history.lock"),
        }
    }

    pub fn archive_dir(&self, context_id: &str) -> PathBuf {
        match task_run_parts(context_id) {
            Some((task_id, timestamp)) => self.task_run_dir(&task_id, &timestamp).join("archive"),
            None => self.context_messages_dir(context_id).join("archive"),
        }
    }

    pub fn archive_file(&self, context_id: &str, compact_id: &str) -> PathBuf {
        self.archive_dir(context_id)
            .join(format!("{compact_id}.json"))
    }

    /// `task/` — enumerate this to discover every task id.
    pub fn tasks_dir(&self) -> PathBuf {
        self.ship_dir().join("task")
    }

    /// `task/<taskId>/task.md`
    pub fn task_definition_file(&self, task_id: &str) -> PathBuf {
        self.ship_dir()
            .join("task")
            .join(encode_segment(task_id))
            .join("task.md")
    }

    /// `task/<taskId>/` — enumerate this, skipping `task.md`, to discover a
    /// task's run timestamps.
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.ship_dir().join("task").join(encode_segment(task_id))
    }

    /// `task/<taskId>/<timestamp>/`
    pub fn task_run_dir(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_dir(task_id).join(timestamp)
    }

    pub fn task_run_input_file(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_run_dir(task_id, timestamp).join("input.md")
    }

    pub fn task_run_output_file(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_run_dir(task_id, timestamp).join("output.md")
    }

    pub fn task_run_result_file(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_run_dir(task_id, timestamp).join("result.md")
    }

    pub fn task_run_error_file(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_run_dir(task_id, timestamp).join("error.md")
    }

    pub fn task_run_json_file(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_run_dir(task_id, timestamp).join("run.json")
    }

    pub fn task_run_history_file(&self, task_id: &str, timestamp: &str) -> PathBuf {
        self.task_run_dir(task_id, timestamp).join("history.jsonl")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Render a `YYYYMMDD-hhmmss-mmm` run timestamp from a UTC instant.
pub fn run_timestamp(now: chrono::DateTime<chrono::Utc>) -> String {
    now.format("%Y%m%d-%H%M%S-%3f").to_string()
}

/// ContextId may contain `:` and other separators (`telegram-chat-42`,
/// `api:chat:7`, `task-run:daily:20240101-000000-000`). Encode it into a
/// single filesystem-safe path segment: alphanumerics, `-` and `_` pass
/// through; everything else becomes `_XX` (uppercase hex of the byte).
pub fn encode_context_id(context_id: &str) -> String {
    encode_segment(context_id)
}

/// Recognizes the `task-run:<taskId>:<timestamp>` context id `TaskRunner`
/// builds for each run (see `ship-tasks::runner::run_one`). `timestamp` is a
/// `YYYYMMDD-hhmmss-mmm` run stamp and never contains `:`, so the last `:`
/// in the remainder always splits task id from timestamp.
fn task_run_parts(context_id: &str) -> Option<(String, String)> {
    let rest = context_id.strip_prefix("task-run:")?;
    let (task_id, timestamp) = rest.rsplit_once(':')?;
    Some((task_id.to_string(), timestamp.to_string()))
}

fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        let c = b as char;
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
            out.push(c);
        } else {
            out.push_str(&format!("_{b:02X}"));
        }
    }
    out
}
