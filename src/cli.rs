//! Thin CLI plumbing (out-of-scope beyond a thin binary entrypoint — §1).

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ship_domain::config::RuntimeConfig;

/// shipd — the Ship Agent Runtime.
#[derive(Debug, Parser)]
#[command(name = "shipd", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the runtime's HTTP surface (default when no subcommand is given).
    Serve,
    /// Print version information.
    Version,
}

/// Load `<root>/.ship/ship.json` if present; an absent file yields defaults.
/// `root` defaults to the current directory, overridable via `SMA_ROOT`.
pub fn load_config_and_root() -> anyhow::Result<(RuntimeConfig, PathBuf)> {
    let root = std::env::var("SMA_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    let config_path = ship_domain::PathLayout::new(root.clone()).config_file();
    let config = RuntimeConfig::load(Path::new(&config_path))?;
    Ok((config, root))
}
