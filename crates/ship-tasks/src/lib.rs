//! `TaskRunner` — timezone-aware cron evaluation, per-run audit trail under
//! `task/<taskId>/<timestamp>/`, and notification delivery.

pub mod cron;
pub mod runner;
pub mod store;

pub use runner::{missed_window_count, runs_to_fire, TaskRunner};
pub use store::TaskStore;
