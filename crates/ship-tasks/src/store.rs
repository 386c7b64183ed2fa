//! Discover `TaskDefinition`s on disk and determine each one's last-run
//! timestamp from its own run-directory history, rather than a separate
//! scheduler state file (the filesystem is the only database — §1).

use std::fs;

use chrono::{DateTime, Utc};
use ship_domain::{Error, PathLayout, Result, TaskDefinition};

pub struct TaskStore {
    layout: PathLayout,
}

impl TaskStore {
    pub fn new(layout: PathLayout) -> Self {
        Self { layout }
    }

    /// Every task id with a well-formed `task.md`; malformed tasks are
    /// logged and skipped, not fatal to the scan.
    pub fn list(&self) -> Vec<TaskDefinition> {
        let dir = self.layout.tasks_dir();
        let Ok(entries) = fs::read_dir(&dir) else {
            return Vec::new();
        };

        let mut tasks = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let task_id = entry.file_name().to_string_lossy().into_owned();
            match self.load(&task_id) {
                Ok(task) => tasks.push(task),
                Err(e) => tracing::warn!(task_id = %task_id, error = %e, "skipping malformed task definition"),
            }
        }
        tasks
    }

    pub fn load(&self, task_id: &str) -> Result<TaskDefinition> {
        let path = self.layout.task_definition_file(task_id);
        let raw = fs::read_to_string(&path)
            .map_err(|_| Error::NotFound(format!("task definition {task_id}")))?;
        TaskDefinition::parse(task_id, &raw)
    }

    /// The most recent run timestamp for a task, or `None` if it has never
    /// run. Run-directory names sort lexically in the same order as their
    /// `YYYYMMDD-hhmmss-mmm` timestamps.
    pub fn last_run_at(&self, task_id: &str) -> Option<DateTime<Utc>> {
        let dir = self.layout.task_dir(task_id);
        let entries = fs::read_dir(&dir).ok()?;
        let mut timestamps: Vec<String> = entries
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        timestamps.sort();
        let latest = timestamps.last()?;
        parse_run_timestamp(latest)
    }
}

fn parse_run_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    use chrono::TimeZone;
    let naive = chrono::NaiveDateTime::parse_from_str(ts, "%Y%m%d-%H%M%S-%3f").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    fn write_task(layout: &PathLayout, id: &str, body: &str) {
        let path = layout.task_definition_file(id);
        stdfs::create_dir_all(path.parent().unwrap()).unwrap();
        stdfs::write(&path, body).unwrap();
    }

    const SAMPLE: &str = "---\ntitle: Daily report\ncron: \"0 9 * * *\"\ncontext_id: telegram-chat-1\n---\nrun it\n";

    #[test]
    fn lists_only_well_formed_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(dir.path());
        write_task(&layout, "good", SAMPLE);
        write_task(&layout, "bad", "not yaml front matter");

        let store = TaskStore::new(layout);
        let tasks = store.list();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "good");
    }

    #[test]
    fn last_run_at_is_none_when_never_run() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(dir.path());
        write_task(&layout, "t", SAMPLE);

        let store = TaskStore::new(layout);
        assert!(store.last_run_at("t").is_none());
    }

    #[test]
    fn last_run_at_picks_latest_timestamp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = PathLayout::new(dir.path());
        write_task(&layout, "t", SAMPLE);
        stdfs::create_dir_all(layout.task_run_dir("t", "20240101-000000-000")).unwrap();
        stdfs::create_dir_all(layout.task_run_dir("t", "20240102-000000-000")).unwrap();

        let store = TaskStore::new(layout);
        let last = store.last_run_at("t").unwrap();
        assert_eq!(last.to_string(), "2024-01-02 00:00:00 UTC");
    }
}
