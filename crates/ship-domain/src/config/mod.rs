//! Typed configuration, one module per concern — mirrors the shape of a
//! `ship.json` on disk (spec.md §6 external interfaces).

pub mod agent;
pub mod history;
pub mod lanes;
pub mod server;
pub mod shell;
pub mod tasks;

pub use agent::AgentConfig;
pub use history::HistoryConfig;
pub use lanes::LaneConfig;
pub use server::ServerConfig;
pub use shell::ShellConfig;
pub use tasks::TaskConfig;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Root configuration object, deserialised from `<root>/.ship/ship.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub lanes: LaneConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub task: TaskConfig,
}

impl RuntimeConfig {
    /// Load `ship.json` if present; an absent file yields all defaults
    /// (config file parsing beyond this point is out of scope — §1).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        Ok(cfg)
    }
}
