//! `write_stdin` and `close_session` — the remaining two session tools.

use serde::{Deserialize, Serialize};

use crate::session::{SessionStatus, ShellSessionRegistry, StdinMessage};

#[derive(Debug, Clone, Deserialize)]
pub struct WriteStdinRequest {
    pub session_id: String,
    #[serde(default)]
    pub chars: String,
    #[serde(default = "default_write_yield_ms")]
    pub yield_ms: u64,
    #[serde(default)]
    pub max_output_tokens: Option<u64>,
}

fn default_write_yield_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteStdinResponse {
    pub output: String,
    pub has_more_output: bool,
    pub exit_code: Option<i32>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub async fn write_stdin(
    registry: &ShellSessionRegistry,
    req: WriteStdinRequest,
) -> ship_domain::Result<WriteStdinResponse> {
    let arc = registry
        .get(&req.session_id)
        .ok_or_else(|| ship_domain::Error::NotFound(format!("shell session {}", req.session_id)))?;

    let is_empty_poll = req.chars.is_empty();
    // Empty write_stdin is a pure poll; clamp its yield to avoid hot loops.
    let yield_ms = if is_empty_poll {
        req.yield_ms.max(registry.config().min_poll_yield_ms)
    } else {
        req.yield_ms
    };

    let tx = {
        let s = arc.read();
        s.stdin_tx.clone()
    };
    if let Some(tx) = tx {
        if !req.chars.is_empty() {
            let _ = tx.send(StdinMessage::Data(req.chars.into_bytes())).await;
        }
    }

    let done_notify = arc.read().done_notify.clone();
    tokio::select! {
        _ = done_notify.notified() => {}
        _ = tokio::time::sleep(std::time::Duration::from_millis(yield_ms)) => {
            tokio::time::sleep(std::time::Duration::from_millis(registry.config().coalesce_ms)).await;
        }
    }

    let cfg = registry.config();
    let max_chars = match req.max_output_tokens {
        Some(tokens) => cfg.max_output_chars.min((tokens * 4) as usize),
        None => cfg.max_output_chars,
    };

    let mut s = arc.write();
    let page = s.output.page_from(s.read_offset, max_chars, cfg.max_output_lines);
    s.read_offset = page.next_offset;
    let has_more_output = page.truncated || !s.status.is_terminal();
    let note = if s.output.dropped_chars() > 0 {
        Some(format!("{} chars dropped from buffer head", s.output.dropped_chars()))
    } else {
        None
    };
    Ok(WriteStdinResponse {
        output: page.text,
        has_more_output,
        exit_code: s.exit_code,
        status: s.status,
        note,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CloseSessionResponse {
    pub closed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn close_session(
    registry: &ShellSessionRegistry,
    req: CloseSessionRequest,
) -> CloseSessionResponse {
    let arc = match registry.get(&req.session_id) {
        Some(arc) => arc,
        None => {
            return CloseSessionResponse {
                closed: false,
                error: Some("session not found".to_string()),
            }
        }
    };

    let kill_tx = {
        let s = arc.read();
        s.kill_tx.clone()
    };
    if let Some(tx) = kill_tx {
        let _ = tx.try_send(());
    } else if !req.force {
        // Already exited; nothing to signal, just drop it below.
    }

    registry.remove(&req.session_id);
    CloseSessionResponse {
        closed: true,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{exec_command, ExecCommandRequest};
    use ship_domain::config::ShellConfig;
    use ship_domain::RequestContext;

    #[tokio::test]
    async fn write_stdin_echoes_back_through_cat() {
        let registry = ShellSessionRegistry::new(ShellConfig::default());
        let ctx = RequestContext::new("api:chat:1");
        let dir = tempfile::tempdir().unwrap();
        let started = exec_command(
            &registry,
            &ctx,
            dir.path(),
            ExecCommandRequest {
                cmd: "cat".to_string(),
                workdir: None,
                shell: None,
                login: true,
                yield_ms: 100,
                max_output_tokens: None,
            },
        )
        .await
        .unwrap();
        let session_id = started.session_id.expect("cat should still be running");

        let resp = write_stdin(
            &registry,
            WriteStdinRequest {
                session_id: session_id.clone(),
                chars: "ping\n".to_string(),
                yield_ms: 200,
                max_output_tokens: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(resp.output, "ping\n");

        close_session(&registry, CloseSessionRequest { session_id, force: true }).await;
    }

    #[tokio::test]
    async fn close_session_removes_from_registry() {
        let registry = ShellSessionRegistry::new(ShellConfig::default());
        let ctx = RequestContext::new("api:chat:1");
        let dir = tempfile::tempdir().unwrap();
        let started = exec_command(
            &registry,
            &ctx,
            dir.path(),
            ExecCommandRequest {
                cmd: "sleep 5".to_string(),
                workdir: None,
                shell: None,
                login: true,
                yield_ms: 50,
                max_output_tokens: None,
            },
        )
        .await
        .unwrap();
        let session_id = started.session_id.unwrap();
        let resp = close_session(&registry, CloseSessionRequest { session_id: session_id.clone(), force: true }).await;
        assert!(resp.closed);
        assert!(registry.get(&session_id).is_none());
    }

    #[tokio::test]
    async fn write_stdin_unknown_session_errors() {
        let registry = ShellSessionRegistry::new(ShellConfig::default());
        let err = write_stdin(
            &registry,
            WriteStdinRequest {
                session_id: "nonexistent".to_string(),
                chars: String::new(),
                yield_ms: 10,
                max_output_tokens: None,
            },
        )
        .await;
        assert!(err.is_err());
    }
}
