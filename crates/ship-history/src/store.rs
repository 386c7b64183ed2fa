//! `HistoryStore` — durable, concurrency-safe per-context message log.

use std::io::Write as _;

use chrono::Utc;
use ship_domain::config::HistoryConfig;
use ship_domain::{ArchiveSnapshot, ChatMessage, MetaFile, PathLayout, Result};
use ship_providers::{LlmProvider, ModelMessage};
use uuid::Uuid;

use crate::{atomic, compaction, convert, lock};

#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    pub summary_text: String,
    pub archived_count: usize,
    pub archive_id: Option<String>,
}

/// Lazily created on first reference to its `contextId`; lives for the
/// runtime's lifetime (created by `Runtime`, never by components directly).
pub struct HistoryStore {
    layout: PathLayout,
    context_id: String,
    config: HistoryConfig,
}

impl HistoryStore {
    pub fn new(layout: PathLayout, context_id: impl Into<String>, config: HistoryConfig) -> Self {
        Self {
            layout,
            context_id: context_id.into(),
            config,
        }
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    fn history_path(&self) -> std::path::PathBuf {
        self.layout.history_file(&self.context_id)
    }

    fn lock_path(&self) -> std::path::PathBuf {
        self.layout.history_lock_file(&self.context_id)
    }

    fn meta_path(&self) -> std::path::PathBuf {
        self.layout.meta_file(&self.context_id)
    }

    async fn acquire_lock(&self) -> Result<lock::LockGuard> {
        lock::acquire(
            &self.lock_path(),
            self.config.lock_stale_secs,
            self.config.lock_wait_cap_secs,
        )
        .await
    }

    /// `Append(msg)` — atomic relative to other in-process appenders.
    pub async fn append(&self, messages: &[ChatMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let _guard = self.acquire_lock().await?;
        self.append_unlocked(messages)
    }

    fn append_unlocked(&self, messages: &[ChatMessage]) -> Result<()> {
        let path = self.history_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut buf = String::new();
        for msg in messages {
            buf.push_str(&serde_json::to_string(msg)?);
            buf.push('\n');
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    /// `LoadAll()` — skips malformed lines with a warning (never fails the
    /// whole read because of one corrupt record).
    pub fn load_all(&self) -> Result<Vec<ChatMessage>> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)?;
        let mut out = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ChatMessage>(line) {
                Ok(msg) => out.push(msg),
                Err(e) => {
                    tracing::warn!(
                        context_id = %self.context_id,
                        error = %e,
                        "skipping malformed history line"
                    );
                }
            }
        }
        Ok(out)
    }

    pub fn load_range(&self, start: usize, end: usize) -> Result<Vec<ChatMessage>> {
        let all = self.load_all()?;
        let end = end.min(all.len());
        let start = start.min(end);
        Ok(all[start..end].to_vec())
    }

    pub fn count_messages(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    /// The last `n` messages, per AgentTurn step 3's bounded-tail read.
    pub fn tail(&self, n: usize) -> Result<Vec<ChatMessage>> {
        let all = self.load_all()?;
        let start = all.len().saturating_sub(n);
        Ok(all[start..].to_vec())
    }

    /// `ToModelMessages(tools)` — tools do not affect the conversion itself
    /// (only which tool defs are offered to the model); dropping incomplete
    /// tool-call pairs depends only on the message slice.
    pub fn to_model_messages(&self, messages: &[ChatMessage]) -> Vec<ModelMessage> {
        convert::to_model_messages(messages)
    }

    pub fn load_meta(&self) -> Result<MetaFile> {
        let path = self.meta_path();
        if !path.exists() {
            return Ok(MetaFile::new(self.context_id.clone()));
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_meta(&self, meta: &MetaFile) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(meta)?;
        atomic::write_atomic(&self.meta_path(), &bytes)
    }

    pub fn update_meta(&self, patch: impl FnOnce(&mut MetaFile)) -> Result<MetaFile> {
        let mut meta = self.load_meta()?;
        patch(&mut meta);
        meta.updated_at = Utc::now();
        self.save_meta(&meta)?;
        Ok(meta)
    }

    pub fn add_pinned_skill_id(&self, skill_id: &str) -> Result<MetaFile> {
        self.update_meta(|m| m.add_pinned_skill_id(skill_id))
    }

    pub fn remove_pinned_skill_id(&self, skill_id: &str) -> Result<MetaFile> {
        self.update_meta(|m| m.remove_pinned_skill_id(skill_id))
    }

    pub fn set_pinned_skill_ids(&self, ids: Vec<String>) -> Result<MetaFile> {
        self.update_meta(|m| m.set_pinned_skill_ids(ids))
    }

    /// Wipe this context's history, used when `AgentTurn` exhausts its
    /// compaction-retry budget on repeated context-overflow (spec.md §4.2
    /// step 8). The meta file (pinned skills, archive pointers) is kept.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.acquire_lock().await?;
        atomic::write_atomic(&self.history_path(), b"")
    }

    /// `CompactIfNeeded` — the full two-phase algorithm of spec.md §4.3.
    /// `system` is the assembled system-prompt text used for the token
    /// budget estimate only.
    pub async fn compact_if_needed(
        &self,
        provider: &dyn LlmProvider,
        system: &str,
    ) -> Result<Option<CompactionOutcome>> {
        let keep_last = self.config.compact_keep_last;

        // Phase 1: short lock, snapshot.
        let snapshot = {
            let _guard = self.acquire_lock().await?;
            self.load_all()?
        };

        if snapshot.len() <= keep_last + 2 {
            return Ok(None);
        }
        let tokens = compaction::estimate_tokens(system, &snapshot);
        if tokens <= self.config.max_input_tokens_approx {
            return Ok(None);
        }
        let (older, _kept) = compaction::partition(&snapshot, keep_last);
        if older.is_empty() {
            return Ok(None);
        }

        // LLM summarisation outside the lock.
        let summary_text =
            compaction::generate_summary(provider, older, self.config.summarisation_input_cap)
                .await;

        // Phase 2: short lock, commit.
        let _guard = self.acquire_lock().await?;
        let current = self.load_all()?;
        let (older2, kept2) = compaction::partition(&current, keep_last);
        if older2.is_empty() {
            // The tail grew to cover everything during summarisation.
            return Ok(None);
        }

        let summary_msg = compaction::summary_message(summary_text.clone(), older2);

        let mut archive_id = None;
        if self.config.archive_on_compact {
            let id = Uuid::new_v4().to_string();
            let snapshot = ArchiveSnapshot::new(self.context_id.clone(), older2.to_vec());
            let bytes = serde_json::to_vec_pretty(&snapshot)?;
            atomic::write_atomic(&self.layout.archive_file(&self.context_id, &id), &bytes)?;
            archive_id = Some(id);
        }

        let mut new_history = Vec::with_capacity(kept2.len() + 1);
        new_history.push(summary_msg);
        new_history.extend_from_slice(kept2);

        let mut buf = String::new();
        for msg in &new_history {
            buf.push_str(&serde_json::to_string(msg)?);
            buf.push('\n');
        }
        atomic::write_atomic(&self.history_path(), buf.as_bytes())?;

        let archived_count = older2.len();
        let max_tokens = self.config.max_input_tokens_approx;
        self.update_meta(|m| {
            if let Some(id) = &archive_id {
                m.last_archive_id = Some(id.clone());
            }
            m.keep_last_messages = Some(keep_last);
            m.max_input_tokens_approx = Some(max_tokens);
        })?;

        Ok(Some(CompactionOutcome {
            summary_text,
            archived_count,
            archive_id,
        }))
    }
}
