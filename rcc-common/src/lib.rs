pub mod config;
pub mod position;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, GridConfig, PatientConfig, InitialConditions, RateConfig, RunConfig, RecruitmentConfig, OutputConfig, Sex};
pub use position::{Position, wrap, torus_manhattan};
pub use sim_params::{SimParams, ExhaustionRates};
pub use snapshot::{Snapshot, AgentRecord, AgentType, AgentState};
