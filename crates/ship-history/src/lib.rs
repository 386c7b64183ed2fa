//! `HistoryStore` — the durable, per-context message log plus its
//! compaction and locking machinery.

pub mod atomic;
pub mod compaction;
pub mod convert;
pub mod lock;
pub mod store;

pub use compaction::estimate_tokens;
pub use store::{CompactionOutcome, HistoryStore};
