//! `Runtime` — the process-wide singleton tying every component together:
//! `PathLayout`, typed config, the tool registry, the agent-turn engine and
//! the lane scheduler. Owns every registry; nothing it hands out carries a
//! back-pointer to this struct (§5 redesign flags).

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use ship_domain::config::RuntimeConfig;
use ship_domain::tool::ToolCapability;
use ship_domain::{PathLayout, RequestContext, Result};
use ship_ingress::{Egress, EnqueueOutcome, IngressConfig, IngressPipeline, PlatformSender, TurnEnqueuer};
use ship_providers::LlmProvider;
use ship_tools::ToolRegistry;

use crate::lane::LaneScheduler;
use crate::turn::AgentTurn;

/// Thin local wrapper so `IngressPipeline<E: TurnEnqueuer>` can be built
/// over a shared `Arc<LaneScheduler>` without implementing a foreign trait
/// for a foreign type.
#[derive(Clone)]
pub struct SchedulerHandle(pub(crate) Arc<LaneScheduler>);

#[async_trait]
impl TurnEnqueuer for SchedulerHandle {
    async fn enqueue(&self, ctx: RequestContext) -> Result<EnqueueOutcome> {
        self.0.enqueue(ctx).await
    }
}

pub struct Runtime {
    layout: PathLayout,
    config: RuntimeConfig,
    tools: Arc<ToolRegistry>,
    turn: Arc<AgentTurn>,
    provider: Arc<dyn LlmProvider>,
    lanes: Arc<LaneScheduler>,
    egress: Option<Arc<Egress>>,
}

impl Runtime {
    pub fn new(
        root: impl Into<PathBuf>,
        config: RuntimeConfig,
        provider: Arc<dyn LlmProvider>,
        sender: Option<Arc<dyn PlatformSender>>,
        capabilities: Vec<ToolCapability>,
    ) -> Arc<Self> {
        let root = root.into();
        let layout = PathLayout::new(root.clone());
        let egress = sender.map(|s| Arc::new(Egress::new(s)));

        let tools = Arc::new(ToolRegistry::new(
            layout.clone(),
            root,
            config.history.clone(),
            config.shell.clone(),
            egress.clone(),
        ));
        let turn = Arc::new(AgentTurn::new(
            layout.clone(),
            config.history.clone(),
            config.agent.clone(),
            tools.clone(),
            egress.clone(),
        ));
        let lanes = LaneScheduler::new(config.lanes.clone(), turn.clone(), provider.clone(), capabilities);

        Arc::new(Self {
            layout,
            config,
            tools,
            turn,
            provider,
            lanes,
            egress,
        })
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn lanes(&self) -> &Arc<LaneScheduler> {
        &self.lanes
    }

    /// The shared turn engine, reused by `ship-tasks`' `TaskRunner` so a
    /// scheduled run and an interactive turn apply identical step-loop and
    /// compaction-retry semantics.
    pub fn turn(&self) -> &Arc<AgentTurn> {
        &self.turn
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub fn egress(&self) -> Option<&Arc<Egress>> {
        self.egress.as_ref()
    }

    fn scheduler_handle(&self) -> SchedulerHandle {
        SchedulerHandle(self.lanes.clone())
    }

    /// Build an `IngressPipeline` bound to this runtime's lane scheduler.
    /// Callers own the returned pipeline (e.g. `shipd`'s `AppState`); it
    /// holds a handle, not the runtime itself.
    pub fn build_ingress_pipeline(&self, ingress_config: IngressConfig) -> IngressPipeline<SchedulerHandle> {
        IngressPipeline::new(
            self.layout.clone(),
            self.config.history.clone(),
            ingress_config,
            self.scheduler_handle(),
        )
    }
}
