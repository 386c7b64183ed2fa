//! `AgentTurn` loop bounds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_step_count_max")]
    pub step_count_max: usize,
    #[serde(default = "default_max_compaction_attempts")]
    pub max_compaction_attempts: usize,
}

fn default_step_count_max() -> usize {
    30
}
fn default_max_compaction_attempts() -> usize {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            step_count_max: default_step_count_max(),
            max_compaction_attempts: default_max_compaction_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_ceilings() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.step_count_max, 30);
        assert_eq!(cfg.max_compaction_attempts, 3);
    }
}
