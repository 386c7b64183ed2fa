//! `TaskDefinition` (markdown + YAML front-matter) and `TaskRun` audit
//! record types.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What happens when the scheduler discovers a missed cron window (the
/// process was down across one or more scheduled firings).
///
/// Not named explicitly in the distilled task runner spec, but implied by
/// "a cron engine evaluates... once per second" — a once-a-second evaluator
/// that was not running across a restart has to decide how to treat the
/// gap. Defaults to `RunOnce`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedPolicy {
    Skip,
    RunOnce,
    CatchUp,
}

impl Default for MissedPolicy {
    fn default() -> Self {
        Self::RunOnce
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Paused,
}

/// Markdown file with YAML front-matter: `{title, description, cron,
/// status, contextId, timezone?}`. The body (everything after the closing
/// `---`) is the task's prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cron: String,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    pub context_id: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub missed_policy: MissedPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(skip)]
    pub body: String,
}

fn default_status() -> TaskStatus {
    TaskStatus::Active
}

#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    title: String,
    #[serde(default)]
    description: String,
    cron: String,
    #[serde(default = "default_status")]
    status: TaskStatus,
    context_id: String,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    missed_policy: MissedPolicy,
    #[serde(default)]
    max_concurrency: Option<usize>,
}

impl TaskDefinition {
    /// Parse `task.md`: `---\n<yaml>\n---\n<body>`.
    pub fn parse(id: &str, raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let rest = raw
            .strip_prefix("---\n")
            .or_else(|| raw.strip_prefix("---\r\n"))
            .ok_or_else(|| Error::Config(format!("task {id}: missing YAML front-matter")))?;
        let end = rest
            .find("\n---")
            .ok_or_else(|| Error::Config(format!("task {id}: unterminated front-matter")))?;
        let yaml = &rest[..end];
        let body = rest[end..]
            .trim_start_matches("\n---")
            .trim_start_matches("\r\n")
            .trim_start_matches('\n')
            .to_string();

        let fm: FrontMatter = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("task {id}: invalid front-matter: {e}")))?;

        Ok(Self {
            id: id.to_string(),
            title: fm.title,
            description: fm.description,
            cron: fm.cron,
            status: fm.status,
            context_id: fm.context_id,
            timezone: fm.timezone,
            missed_policy: fm.missed_policy,
            max_concurrency: fm.max_concurrency,
            body,
        })
    }

    pub fn render(&self) -> Result<String> {
        let fm = FrontMatter {
            title: self.title.clone(),
            description: self.description.clone(),
            cron: self.cron.clone(),
            status: self.status,
            context_id: self.context_id.clone(),
            timezone: self.timezone.clone(),
            missed_policy: self.missed_policy,
            max_concurrency: self.max_concurrency,
        };
        let yaml = serde_yaml::to_string(&fm)
            .map_err(|e| Error::Other(format!("serializing task front-matter: {e}")))?;
        Ok(format!("---\n{yaml}---\n{}", self.body))
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TaskStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTrigger {
    Cron,
    Manual,
    CatchUp,
}

/// `run.json`: `{status, startedAt, endedAt, trigger, contextId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub trigger: RunTrigger,
    pub context_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "---\ntitle: Daily report\ndescription: sends a digest\ncron: \"0 9 * * *\"\ncontext_id: telegram-chat-42\n---\nSummarize yesterday's commits.\n";

    #[test]
    fn parses_front_matter_and_body() {
        let task = TaskDefinition::parse("daily-report", SAMPLE).unwrap();
        assert_eq!(task.title, "Daily report");
        assert_eq!(task.cron, "0 9 * * *");
        assert_eq!(task.context_id, "telegram-chat-42");
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.missed_policy, MissedPolicy::RunOnce);
        assert_eq!(task.body.trim(), "Summarize yesterday's commits.");
    }

    #[test]
    fn rejects_missing_front_matter() {
        assert!(TaskDefinition::parse("bad", "no front matter here").is_err());
    }

    #[test]
    fn round_trips_through_render() {
        let task = TaskDefinition::parse("daily-report", SAMPLE).unwrap();
        let rendered = task.render().unwrap();
        let reparsed = TaskDefinition::parse("daily-report", &rendered).unwrap();
        assert_eq!(reparsed.title, task.title);
        assert_eq!(reparsed.cron, task.cron);
        assert_eq!(reparsed.body, task.body);
    }
}
