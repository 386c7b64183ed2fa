//! `LaneScheduler` resource ceilings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneConfig {
    /// Up to this many distinct lanes run concurrently.
    #[serde(default = "default_max_concurrent_lanes")]
    pub max_concurrent_lanes: usize,
    /// Soft cap on a lane's queue depth before `Enqueue` rejects.
    #[serde(default = "default_max_queue_per_lane")]
    pub max_queue_per_lane: usize,
}

fn default_max_concurrent_lanes() -> usize {
    8
}

fn default_max_queue_per_lane() -> usize {
    32
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lanes: default_max_concurrent_lanes(),
            max_queue_per_lane: default_max_queue_per_lane(),
        }
    }
}

impl LaneConfig {
    /// Clamp to sane bounds, following the teacher's `TaskConfig::clamped`
    /// convention for config values that gate pool sizes.
    pub fn clamped(&self) -> Self {
        Self {
            max_concurrent_lanes: self.max_concurrent_lanes.clamp(1, 256),
            max_queue_per_lane: self.max_queue_per_lane.clamp(1, 10_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_ceilings() {
        let cfg = LaneConfig::default();
        assert_eq!(cfg.max_concurrent_lanes, 8);
        assert_eq!(cfg.max_queue_per_lane, 32);
    }

    #[test]
    fn clamp_rejects_zero() {
        let cfg = LaneConfig {
            max_concurrent_lanes: 0,
            max_queue_per_lane: 0,
        };
        let clamped = cfg.clamped();
        assert_eq!(clamped.max_concurrent_lanes, 1);
        assert_eq!(clamped.max_queue_per_lane, 1);
    }
}
