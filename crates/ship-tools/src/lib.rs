//! `ToolRegistry` — the callable tool set (shell, `chat_send`, context ops,
//! pinned-skill) bound to a `RequestContext`, plus the minimal skill catalog
//! backing pinned-skill prompt injection.

pub mod registry;
pub mod skill;

pub use registry::ToolRegistry;
pub use skill::{SkillCatalog, SkillSummary};
