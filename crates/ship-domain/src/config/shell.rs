//! `ShellSessionRegistry` resource ceilings and paging defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_max_session_pending_chars")]
    pub max_session_pending_chars: usize,
    #[serde(default = "default_max_active_exec_sessions")]
    pub max_active_exec_sessions: usize,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default = "default_max_output_lines")]
    pub max_output_lines: usize,
    #[serde(default = "default_exec_yield_ms")]
    pub default_exec_yield_ms: u64,
    #[serde(default = "default_write_stdin_yield_ms")]
    pub default_write_stdin_yield_ms: u64,
    #[serde(default = "default_min_poll_yield_ms")]
    pub min_poll_yield_ms: u64,
    #[serde(default = "default_coalesce_ms")]
    pub coalesce_ms: u64,
    #[serde(default = "default_idle_gc_minutes")]
    pub idle_gc_minutes: u64,
}

fn default_max_session_pending_chars() -> usize {
    1_000_000
}
fn default_max_active_exec_sessions() -> usize {
    64
}
fn default_max_output_chars() -> usize {
    12_000
}
fn default_max_output_lines() -> usize {
    200
}
fn default_exec_yield_ms() -> u64 {
    10_000
}
fn default_write_stdin_yield_ms() -> u64 {
    250
}
fn default_min_poll_yield_ms() -> u64 {
    5_000
}
fn default_coalesce_ms() -> u64 {
    30
}
fn default_idle_gc_minutes() -> u64 {
    10
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            max_session_pending_chars: default_max_session_pending_chars(),
            max_active_exec_sessions: default_max_active_exec_sessions(),
            max_output_chars: default_max_output_chars(),
            max_output_lines: default_max_output_lines(),
            default_exec_yield_ms: default_exec_yield_ms(),
            default_write_stdin_yield_ms: default_write_stdin_yield_ms(),
            min_poll_yield_ms: default_min_poll_yield_ms(),
            coalesce_ms: default_coalesce_ms(),
            idle_gc_minutes: default_idle_gc_minutes(),
        }
    }
}
