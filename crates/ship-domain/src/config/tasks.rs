//! `TaskRunner` tick cadence and missed-window/concurrency ceilings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// How often the cron evaluator re-scans every task definition.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Upper bound on `MissedPolicy::CatchUp` backfill runs per tick.
    #[serde(default = "default_max_catchup_runs")]
    pub max_catchup_runs: usize,
    /// Default per-task concurrent-run ceiling when a task omits
    /// `max_concurrency`.
    #[serde(default = "default_max_concurrency")]
    pub default_max_concurrency: usize,
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_max_catchup_runs() -> usize {
    5
}

fn default_max_concurrency() -> usize {
    1
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_catchup_runs: default_max_catchup_runs(),
            default_max_concurrency: default_max_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_once_per_second_evaluator() {
        let cfg = TaskConfig::default();
        assert_eq!(cfg.tick_interval_ms, 1_000);
        assert_eq!(cfg.max_catchup_runs, 5);
        assert_eq!(cfg.default_max_concurrency, 1);
    }
}
