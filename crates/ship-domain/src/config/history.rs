//! `HistoryStore` ceilings: in-memory tail, compaction keep-last, locking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_in_memory_history_max")]
    pub in_memory_history_max: usize,
    #[serde(default = "default_compact_keep_last")]
    pub compact_keep_last: usize,
    #[serde(default = "default_summarisation_input_cap")]
    pub summarisation_input_cap: usize,
    #[serde(default = "default_max_input_tokens_approx")]
    pub max_input_tokens_approx: usize,
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
    #[serde(default = "default_lock_wait_cap_secs")]
    pub lock_wait_cap_secs: u64,
    #[serde(default = "default_archive_on_compact")]
    pub archive_on_compact: bool,
}

fn default_in_memory_history_max() -> usize {
    60
}
fn default_compact_keep_last() -> usize {
    30
}
fn default_summarisation_input_cap() -> usize {
    24_000
}
fn default_max_input_tokens_approx() -> usize {
    100_000
}
fn default_lock_stale_secs() -> u64 {
    30
}
fn default_lock_wait_cap_secs() -> u64 {
    60
}
fn default_archive_on_compact() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            in_memory_history_max: default_in_memory_history_max(),
            compact_keep_last: default_compact_keep_last(),
            summarisation_input_cap: default_summarisation_input_cap(),
            max_input_tokens_approx: default_max_input_tokens_approx(),
            lock_stale_secs: default_lock_stale_secs(),
            lock_wait_cap_secs: default_lock_wait_cap_secs(),
            archive_on_compact: default_archive_on_compact(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_ceilings() {
        let cfg = HistoryConfig::default();
        assert_eq!(cfg.in_memory_history_max, 60);
        assert_eq!(cfg.compact_keep_last, 30);
        assert_eq!(cfg.summarisation_input_cap, 24_000);
        assert_eq!(cfg.lock_stale_secs, 30);
        assert_eq!(cfg.lock_wait_cap_secs, 60);
    }
}
