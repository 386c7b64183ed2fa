mod cli;
mod http;
mod provider;
mod sender;
mod state;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ship_domain::tool::ToolCapability;
use ship_providers::LlmProvider;
use ship_runtime::Runtime;
use ship_tasks::{TaskRunner, TaskStore};

use crate::cli::{Cli, Command};
use crate::provider::EchoProvider;
use crate::sender::LoggingSender;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve().await,
        Some(Command::Version) => {
            println!("shipd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    ship_runtime::init_tracing();
    tracing::info!("shipd starting");

    let (mut config, root) = cli::load_config_and_root()?;
    config.server = config.server.apply_env_overrides();

    let provider: Arc<dyn LlmProvider> = Arc::new(EchoProvider::new());
    let sender: Arc<dyn ship_ingress::PlatformSender> = Arc::new(LoggingSender);

    let interactive_capabilities = vec![
        ToolCapability::Shell,
        ToolCapability::ChatSend,
        ToolCapability::ContextOps,
        ToolCapability::PinnedSkill,
    ];

    let runtime = Runtime::new(root, config.clone(), provider, Some(sender), interactive_capabilities.clone());

    let task_store = Arc::new(TaskStore::new(runtime.layout().clone()));
    let task_runner = Arc::new(TaskRunner::new(
        runtime.layout().clone(),
        config.task.clone(),
        config.history.clone(),
        runtime.turn().clone(),
        runtime.provider().clone(),
        runtime.egress().cloned(),
    ));
    tracing::info!(tick_interval_ms = config.task.tick_interval_ms, "task runner ready");
    tokio::spawn(task_runner.clone().run_forever());

    let state = AppState {
        runtime,
        tasks: task_runner,
        task_store,
        interactive_capabilities,
    };

    let app = http::router(state);
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "shipd listening");
    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}
