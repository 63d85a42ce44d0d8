use serde::{Deserialize, Serialize};
use crate::config::Sex;

/// Exhaustion amounts a T cell is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExhaustionRates {
    pub from_tumor: f64,
    pub from_treg: f64,
    pub from_androgen: f64,
    /// Exhaustion removed by `activate_by_ici`.
    pub ici_activation: f64,
}

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // World & Grid
    pub width: u32,
    pub height: u32,
    pub search_radius: u32,

    // Patient
    pub sex: Sex,

    // Agent rates
    pub exhaustion: ExhaustionRates,
    pub p_treg_add: f64,
    pub p_tumor_cell_add: f64,
    pub ici_exhaustion: f64, // reserved
    pub ici_relief: f64,

    // Termination
    pub max_steps: u32,
    pub death_threshold_percent: f64,
    pub death_persistence_steps: u32,

    // Recruitment hooks
    pub recruit_androgens: bool,
    pub recruit_t_cells: bool,
}
