//! Bounded, time-windowed, disk-persisted dedupe set for `(contextId,
//! messageId)` pairs.
//!
//! Grounded on the teacher gateway's inbound `DedupeStore`, reimplemented
//! here as a self-contained bounded set rather than copied verbatim, since
//! the teacher's version is wired into a larger multi-provider inbound
//! stack outside this crate's scope. Persistence uses `ship_history::atomic`'s
//! write-temp-then-rename helper, matching `HistoryStore`'s own meta/archive
//! rewrite convention (spec.md §5 Shared-resource policy), so a redelivered
//! message is still recognized as a duplicate across a process restart
//! (spec.md §4.5, Testable Property 8).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DedupeRecord {
    context_id: String,
    message_id: String,
    seen_at: DateTime<Utc>,
}

pub struct DedupeStore {
    window: Duration,
    path: PathBuf,
    seen: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl DedupeStore {
    pub fn new(window_minutes: i64) -> Self {
        Self::at_path(window_minutes, PathBuf::new())
    }

    /// Loads any still-in-window records from `path`, discarding expired
    /// ones; an absent or corrupt file just starts from an empty set.
    pub fn at_path(window_minutes: i64, path: impl Into<PathBuf>) -> Self {
        let window = Duration::minutes(window_minutes);
        let path = path.into();
        let now = Utc::now();
        let mut seen = HashMap::new();

        if let Ok(raw) = std::fs::read_to_string(&path) {
            if let Ok(records) = serde_json::from_str::<Vec<DedupeRecord>>(&raw) {
                for record in records {
                    if now.signed_duration_since(record.seen_at) < window {
                        seen.insert((record.context_id, record.message_id), record.seen_at);
                    }
                }
            }
        }

        Self {
            window,
            path,
            seen: Mutex::new(seen),
        }
    }

    /// Returns `true` if `(context_id, message_id)` was already seen within
    /// the window; records it as seen either way and persists the set.
    pub fn is_duplicate(&self, context_id: &str, message_id: &str) -> bool {
        let key = (context_id.to_string(), message_id.to_string());
        let now = Utc::now();
        let mut seen = self.seen.lock();
        seen.retain(|_, at| now.signed_duration_since(*at) < self.window);
        let duplicate = seen.contains_key(&key);
        if !duplicate {
            seen.insert(key, now);
        }
        self.persist(&seen);
        duplicate
    }

    fn persist(&self, seen: &HashMap<(String, String), DateTime<Utc>>) {
        if self.path.as_os_str().is_empty() {
            return;
        }
        let records: Vec<DedupeRecord> = seen
            .iter()
            .map(|((context_id, message_id), seen_at)| DedupeRecord {
                context_id: context_id.clone(),
                message_id: message_id.clone(),
                seen_at: *seen_at,
            })
            .collect();
        let Ok(json) = serde_json::to_vec(&records) else {
            return;
        };
        if let Err(e) = ship_history::atomic::write_atomic(&self.path, &json) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist dedupe set");
        }
    }
}

impl Default for DedupeStore {
    fn default() -> Self {
        Self::new(10)
    }
}
