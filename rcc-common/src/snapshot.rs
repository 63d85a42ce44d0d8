use serde::{Serialize, Deserialize};
use std::fmt;

/// The five agent variants. Closed set; queries and metrics dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentType {
    TumorCell,
    TCell,
    TReg,
    Androgen,
    Ici,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentType::TumorCell => "TumorCell",
            AgentType::TCell => "TCell",
            AgentType::TReg => "TReg",
            AgentType::Androgen => "Androgen",
            AgentType::Ici => "ICI",
        };
        f.write_str(name)
    }
}

/// Categorical agent state. Tumor cells use {Active, Dead}; T cells and androgens
/// use {Active, Exhausted}; T regs and ICI agents are always Active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Active,
    Exhausted,
    Dead,
}

/// Per-agent row of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: u64,
    pub agent_type: AgentType,
    pub state: AgentState,
    /// Present for T cells and androgens only.
    pub exhaustion: Option<f64>,
    pub x: u32,
    pub y: u32,
}

/// Aggregate metrics of the simulation at the end of one step.
/// Derived view; recomputed on request, never fed back into the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub step: u32,
    pub t_cells: usize,
    pub active_t_cells: usize,
    pub exhausted_t_cells: usize,
    pub tumor_cells: usize,
    pub t_regs: usize,
    pub androgens: usize,
    pub ici: usize,
    /// Mean over every T cell, 0 when there are none.
    pub mean_t_cell_exhaustion: f64,
    pub tumor_coverage_percent: f64,
    pub blood_vessel_density: f64,
    pub alive: bool,
    pub tumor_defeated: bool,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "agents": null
    pub agents: Option<Vec<AgentRecord>>,
}
