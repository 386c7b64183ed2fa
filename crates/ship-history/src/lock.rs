//! Best-effort, single-process file lock via exclusive create of
//! `.history.lock`, per spec.md §4.3's locking discipline.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use ship_domain::{Error, Result};
use uuid::Uuid;

#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    token: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Re-read the token before deleting so another process's lock
        // (acquired after ours was force-removed as stale) is never lost.
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents == self.token => {
                let _ = std::fs::remove_file(&self.path);
            }
            _ => {}
        }
    }
}

/// Acquire the sentinel lock at `lock_path`, waiting up to `wait_cap_secs`.
/// A lock file older than `stale_secs` is forcibly removed and
/// re-acquisition is retried.
pub async fn acquire(lock_path: &Path, stale_secs: u64, wait_cap_secs: u64) -> Result<LockGuard> {
    let token = format!(
        "{}:{}:{}",
        std::process::id(),
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4()
    );
    let start = Instant::now();

    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(mut file) => {
                file.write_all(token.as_bytes())?;
                return Ok(LockGuard {
                    path: lock_path.to_path_buf(),
                    token,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if is_stale(lock_path, stale_secs) {
                    let _ = std::fs::remove_file(lock_path);
                    continue;
                }
                if start.elapsed() > Duration::from_secs(wait_cap_secs) {
                    return Err(Error::LockTimeout {
                        path: lock_path.display().to_string(),
                    });
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => return Err(Error::Io(e)),
        }
    }
}

fn is_stale(lock_path: &Path, stale_secs: u64) -> bool {
    std::fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .map(|modified| {
            modified
                .elapsed()
                .map(|age| age > Duration::from_secs(stale_secs))
                .unwrap_or(false)
        })
        .unwrap_or(false)
}
