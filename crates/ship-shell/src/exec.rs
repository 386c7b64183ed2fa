//! `exec_command` — start a session, collect output until the yield window
//! elapses or the session goes idle, return a page plus a `session_id` for
//! follow-up if the process is still alive or output remains.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ship_domain::RequestContext;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};

use crate::output::OutputBuffer;
use crate::session::{ShellSession, ShellSessionRegistry, SessionStatus, StdinMessage};

#[derive(Debug, Clone, Deserialize)]
pub struct ExecCommandRequest {
    pub cmd: String,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default = "default_login")]
    pub login: bool,
    #[serde(default = "default_yield_ms")]
    pub yield_ms: u64,
    #[serde(default)]
    pub max_output_tokens: Option<u64>,
}

fn default_login() -> bool {
    true
}
fn default_yield_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecCommandResponse {
    pub session_id: Option<String>,
    pub output: String,
    pub has_more_output: bool,
    pub exit_code: Option<i32>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// `page_caps(maxOutputTokens)` — `min(cfg.maxOutputChars, tokens*4)` chars,
/// `cfg.maxOutputLines` lines.
fn page_caps(cfg_max_chars: usize, cfg_max_lines: usize, max_output_tokens: Option<u64>) -> (usize, usize) {
    let max_chars = match max_output_tokens {
        Some(tokens) => cfg_max_chars.min((tokens * 4) as usize),
        None => cfg_max_chars,
    };
    (max_chars, cfg_max_lines)
}

pub async fn exec_command(
    registry: &ShellSessionRegistry,
    ctx: &RequestContext,
    project_root: &std::path::Path,
    req: ExecCommandRequest,
) -> ship_domain::Result<ExecCommandResponse> {
    let cfg = registry.config().clone();
    let session_id = uuid::Uuid::new_v4().to_string();

    let shell_bin = req.shell.clone().unwrap_or_else(|| "sh".to_string());
    let mut cmd = Command::new(&shell_bin);
    if req.login {
        cmd.arg("-lc");
    } else {
        cmd.arg("-c");
    }
    cmd.arg(&req.cmd);
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.stdin(std::process::Stdio::piped());

    let workdir = resolve_workdir(project_root, req.workdir.as_deref());
    cmd.current_dir(&workdir);
    for (k, v) in ctx.as_env_vars() {
        cmd.env(k, v);
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            return Ok(ExecCommandResponse {
                session_id: None,
                output: String::new(),
                has_more_output: false,
                exit_code: None,
                status: SessionStatus::Failed,
                note: Some(format!("failed to spawn: {e}")),
            });
        }
    };

    let (stdin_tx, stdin_rx) = mpsc::channel::<StdinMessage>(32);
    let (kill_tx, kill_rx) = mpsc::channel::<()>(1);
    let done_notify = Arc::new(Notify::new());

    let session = ShellSession {
        id: session_id.clone(),
        command: req.cmd.clone(),
        workdir: Some(workdir.display().to_string()),
        started_at: Utc::now(),
        finished_at: None,
        status: SessionStatus::Running,
        exit_code: None,
        output: OutputBuffer::new(cfg.max_session_pending_chars),
        stdin_tx: Some(stdin_tx),
        kill_tx: Some(kill_tx),
        done_notify: done_notify.clone(),
        read_offset: 0,
    };
    let arc = registry.try_register(session)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdin = child.stdin.take();
    spawn_monitor(child, arc.clone(), stdin_rx, kill_rx, stdout, stderr, stdin, done_notify.clone());

    let (max_chars, max_lines) = page_caps(cfg.max_output_chars, cfg.max_output_lines, req.max_output_tokens);
    wait_and_page(&arc, &done_notify, req.yield_ms, cfg.coalesce_ms, max_chars, max_lines).await
}

async fn wait_and_page(
    arc: &Arc<parking_lot::RwLock<ShellSession>>,
    done_notify: &Notify,
    yield_ms: u64,
    coalesce_ms: u64,
    max_chars: usize,
    max_lines: usize,
) -> ship_domain::Result<ExecCommandResponse> {
    tokio::select! {
        _ = done_notify.notified() => {}
        _ = tokio::time::sleep(std::time::Duration::from_millis(yield_ms)) => {
            // Still running at the yield deadline: coalesce a little more.
            tokio::time::sleep(std::time::Duration::from_millis(coalesce_ms)).await;
        }
    }

    let mut s = arc.write();
    let page = s.output.page_from(s.read_offset, max_chars, max_lines);
    s.read_offset = page.next_offset;
    let has_more_output = page.truncated || !s.status.is_terminal();
    let note = if s.output.dropped_chars() > 0 {
        Some(format!("{} chars dropped from buffer head", s.output.dropped_chars()))
    } else {
        None
    };
    Ok(ExecCommandResponse {
        session_id: if has_more_output || !s.status.is_terminal() {
            Some(s.id.clone())
        } else {
            None
        },
        output: page.text,
        has_more_output,
        exit_code: s.exit_code,
        status: s.status,
        note,
    })
}

fn resolve_workdir(project_root: &std::path::Path, workdir: Option<&str>) -> std::path::PathBuf {
    match workdir {
        Some(w) if std::path::Path::new(w).is_absolute() => std::path::PathBuf::from(w),
        Some(w) => project_root.join(w),
        None => project_root.to_path_buf(),
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_monitor(
    mut child: tokio::process::Child,
    session: Arc<parking_lot::RwLock<ShellSession>>,
    mut stdin_rx: mpsc::Receiver<StdinMessage>,
    mut kill_rx: mpsc::Receiver<()>,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    stdin: Option<tokio::process::ChildStdin>,
    done_notify: Arc<Notify>,
) {
    tokio::spawn(async move {
        let out_session = session.clone();
        let stdout_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    let mut s = out_session.write();
                    s.output.push(&line);
                    s.output.push("\n");
                }
            }
        });

        let err_session = session.clone();
        let stderr_task = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    let mut s = err_session.write();
                    s.output.push(&line);
                    s.output.push("\n");
                }
            }
        });

        let stdin_task = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                while let Some(msg) = stdin_rx.recv().await {
                    match msg {
                        StdinMessage::Data(data) => {
                            let _ = stdin.write_all(&data).await;
                            let _ = stdin.flush().await;
                        }
                        StdinMessage::Eof => {
                            drop(stdin);
                            return;
                        }
                    }
                }
            }
        });

        tokio::select! {
            result = child.wait() => {
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                stdin_task.abort();
                let mut s = session.write();
                match result {
                    Ok(exit) => {
                        s.exit_code = exit.code();
                        s.status = SessionStatus::Exited;
                    }
                    Err(e) => {
                        s.output.push(&format!("\n[process error: {e}]"));
                        s.status = SessionStatus::Failed;
                    }
                }
                s.finished_at = Some(Utc::now());
                s.stdin_tx = None;
                s.kill_tx = None;
            }
            _ = kill_rx.recv() => {
                let _ = child.kill().await;
                let _ = stdout_task.await;
                let _ = stderr_task.await;
                stdin_task.abort();
                let mut s = session.write();
                s.output.push("\n[killed]");
                s.status = SessionStatus::Killed;
                s.finished_at = Some(Utc::now());
                s.stdin_tx = None;
                s.kill_tx = None;
            }
        }

        done_notify.notify_waiters();
    });
}
