//! `ShellSessionRegistry` — in-memory registry of live and recently-exited
//! shell subprocess sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use ship_domain::config::ShellConfig;
use ship_domain::{Error, Result};
use tokio::sync::{mpsc, Notify};

use crate::output::OutputBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Exited,
    Killed,
    TimedOut,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Running)
    }
}

pub enum StdinMessage {
    Data(Vec<u8>),
    Eof,
}

pub struct ShellSession {
    pub id: String,
    pub command: String,
    pub workdir: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub exit_code: Option<i32>,
    pub output: OutputBuffer,
    pub stdin_tx: Option<mpsc::Sender<StdinMessage>>,
    pub kill_tx: Option<mpsc::Sender<()>>,
    pub done_notify: Arc<Notify>,
    /// Byte offset into `output` already delivered to the caller via a
    /// previous `exec_command`/`write_stdin` page, so repeated polls drain
    /// forward instead of replaying from the start.
    pub read_offset: usize,
}

/// Registers live sessions, enforces the concurrent-session ceiling with
/// idle-GC-before-reject, and garbage-collects exited, drained sessions
/// after the idle window.
pub struct ShellSessionRegistry {
    sessions: RwLock<HashMap<String, Arc<RwLock<ShellSession>>>>,
    config: ShellConfig,
}

impl ShellSessionRegistry {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Admit a new session, garbage-collecting exited sessions first; if
    /// still at capacity, reject.
    pub fn try_register(&self, session: ShellSession) -> Result<Arc<RwLock<ShellSession>>> {
        self.gc_exited();
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.config.max_active_exec_sessions {
            return Err(Error::ResourceLimit(format!(
                "maximum of {} concurrent shell sessions reached",
                self.config.max_active_exec_sessions
            )));
        }
        let id = session.id.clone();
        let arc = Arc::new(RwLock::new(session));
        sessions.insert(id, arc.clone());
        Ok(arc)
    }

    pub fn get(&self, id: &str) -> Option<Arc<RwLock<ShellSession>>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RwLock<ShellSession>>> {
        self.sessions.write().remove(id)
    }

    fn gc_exited(&self) {
        let mut sessions = self.sessions.write();
        sessions.retain(|_, arc| !Self::eligible_for_gc(arc));
    }

    fn eligible_for_gc(arc: &Arc<RwLock<ShellSession>>) -> bool {
        let s = arc.read();
        s.status.is_terminal() && s.read_offset >= s.output.len()
    }

    /// Idle GC: exited sessions whose buffer is fully drained and whose
    /// `finished_at` is older than `idle_gc_minutes` are dropped outright.
    pub fn idle_gc(&self) -> usize {
        let cutoff = chrono::Duration::minutes(self.config.idle_gc_minutes as i64);
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, arc| {
            let s = arc.read();
            if !s.status.is_terminal() || s.read_offset < s.output.len() {
                return true;
            }
            match s.finished_at {
                Some(finished) => now.signed_duration_since(finished) < cutoff,
                None => true,
            }
        });
        before - sessions.len()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(id: &str, status: SessionStatus) -> ShellSession {
        ShellSession {
            id: id.to_string(),
            command: "echo hi".to_string(),
            workdir: None,
            started_at: Utc::now(),
            finished_at: if status.is_terminal() { Some(Utc::now()) } else { None },
            status,
            exit_code: None,
            output: OutputBuffer::new(1000),
            stdin_tx: None,
            kill_tx: None,
            done_notify: Arc::new(Notify::new()),
            read_offset: 0,
        }
    }

    #[test]
    fn rejects_beyond_max_active_sessions() {
        let mut cfg = ShellConfig::default();
        cfg.max_active_exec_sessions = 2;
        let registry = ShellSessionRegistry::new(cfg);
        registry.try_register(make_session("a", SessionStatus::Running)).unwrap();
        registry.try_register(make_session("b", SessionStatus::Running)).unwrap();
        let err = registry.try_register(make_session("c", SessionStatus::Running));
        assert!(err.is_err());
    }

    #[test]
    fn gc_reclaims_exited_sessions_before_rejecting() {
        let mut cfg = ShellConfig::default();
        cfg.max_active_exec_sessions = 1;
        let registry = ShellSessionRegistry::new(cfg);
        registry.try_register(make_session("a", SessionStatus::Exited)).unwrap();
        // "a" already exited; registering "b" should GC it first.
        registry.try_register(make_session("b", SessionStatus::Running)).unwrap();
        assert_eq!(registry.active_count(), 1);
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn gc_keeps_exited_sessions_with_unread_output() {
        let mut cfg = ShellConfig::default();
        cfg.max_active_exec_sessions = 1;
        let registry = ShellSessionRegistry::new(cfg);
        let mut a = make_session("a", SessionStatus::Exited);
        a.output.push("still unread\n");
        registry.try_register(a).unwrap();
        // "a" exited but its buffer hasn't been drained by a caller yet;
        // registering "b" must not reclaim it out from under a pending page.
        let err = registry.try_register(make_session("b", SessionStatus::Running));
        assert!(err.is_err());
        assert!(registry.get("a").is_some());
    }

    #[test]
    fn idle_gc_keeps_stale_exited_sessions_with_unread_output() {
        let registry = ShellSessionRegistry::new(ShellConfig::default());
        let mut stale = make_session("stale", SessionStatus::Exited);
        stale.finished_at = Some(Utc::now() - chrono::Duration::minutes(20));
        stale.output.push("still unread\n");
        registry.try_register(stale).unwrap();
        let removed = registry.idle_gc();
        assert_eq!(removed, 0);
        assert!(registry.get("stale").is_some());
    }

    #[test]
    fn idle_gc_drops_only_stale_exited_sessions() {
        let registry = ShellSessionRegistry::new(ShellConfig::default());
        let mut fresh = make_session("fresh", SessionStatus::Exited);
        fresh.finished_at = Some(Utc::now());
        let mut stale = make_session("stale", SessionStatus::Exited);
        stale.finished_at = Some(Utc::now() - chrono::Duration::minutes(20));
        registry.try_register(fresh).unwrap();
        registry.try_register(stale).unwrap();
        let removed = registry.idle_gc();
        assert_eq!(removed, 1);
        assert!(registry.get("fresh").is_some());
        assert!(registry.get("stale").is_none());
    }
}
