//! `AgentTurn`, `LaneScheduler`, `Runtime` and `Telemetry` — the components
//! that drive one user turn end to end and wire every other crate into a
//! single process-wide singleton.

pub mod lane;
pub mod runtime;
pub mod telemetry;
pub mod turn;

pub use lane::LaneScheduler;
pub use runtime::{Runtime, SchedulerHandle};
pub use telemetry::{init_tracing, request_span};
pub use turn::{AgentStepEvent, AgentTurn, OnStep, TurnOutcome};
