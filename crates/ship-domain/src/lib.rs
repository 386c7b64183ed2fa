//! Shared data model, error taxonomy, configuration and path layout used by
//! every crate in the agent runtime.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod paths;
pub mod task;
pub mod tool;

pub use context::{Channel, PlatformEvent, RequestContext, TargetType};
pub use error::{Error, Result};
pub use message::{ArchiveSnapshot, ChatMessage, MessageKind, MessageSource, MetaFile, Part, Role, SourceRange};
pub use paths::PathLayout;
pub use task::{MissedPolicy, RunRecord, RunStatus, RunTrigger, TaskDefinition, TaskStatus};
pub use tool::{ToolCall, ToolCapability, ToolDefinition};
