pub mod agent;
pub mod batch;
pub mod behavior;
pub mod grid;
pub mod movement;
pub mod population;
pub mod simulation;
pub mod survival;
pub mod world;

// Re-export the engine entry points and the shared vocabulary
pub use agent::{Agent, AgentId, AgentKind};
pub use batch::{run_batch, survival_deviation, RunSummary};
pub use simulation::Simulation;
pub use survival::{DeathCause, Outcome, SimulationStatus};
pub use world::World;

pub use rcc_common::{AgentRecord, AgentState, AgentType, Position, Sex, SimParams, SimulationConfig, Snapshot};
