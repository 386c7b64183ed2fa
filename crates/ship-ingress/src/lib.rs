//! `IngressPipeline` (`PlatformEvent` → context + enqueue) and `Egress`
//! (the `chat_send` tool's chunking/escape semantics).

pub mod dedupe;
pub mod egress;
pub mod mapping;
pub mod pipeline;

pub use dedupe::DedupeStore;
pub use egress::{chunk_message, normalize_escapes, Egress, PlatformSender};
pub use mapping::{context_id_for, task_run_context_id};
pub use pipeline::{EnqueueOutcome, IngressConfig, IngressOutcome, IngressPipeline, TurnEnqueuer};
