use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the patient died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// No active T cell for longer than the persistence window.
    ImmuneCollapse,
    /// Tumor coverage reached the death threshold.
    TumorBurden,
}

/// Terminal condition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    PatientDied(DeathCause),
    TumorCleared,
    MaxStepsReached,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::PatientDied(DeathCause::ImmuneCollapse) => write!(f, "patient died (immune collapse)"),
            Outcome::PatientDied(DeathCause::TumorBurden) => write!(f, "patient died (tumor burden)"),
            Outcome::TumorCleared => write!(f, "tumor defeated"),
            Outcome::MaxStepsReached => write!(f, "max steps reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Running,
    Ended(Outcome),
}

/// Death rule with hysteresis: the loss of every active T cell only kills the
/// patient once it has lasted more than `persistence_steps` steps.
#[derive(Debug, Clone)]
pub struct SurvivalTracker {
    /// Step at which active T cells were first seen at zero, if they still are.
    zero_active_since: Option<u32>,
    persistence_steps: u32,
    death_threshold_percent: f64,
}

impl SurvivalTracker {
    pub fn new(persistence_steps: u32, death_threshold_percent: f64) -> Self {
        Self {
            zero_active_since: None,
            persistence_steps,
            death_threshold_percent,
        }
    }

    /// Feeds the active T-cell count observed at the end of `step`.
    pub fn observe(&mut self, step: u32, active_t_cells: usize) {
        if active_t_cells > 0 {
            self.zero_active_since = None;
        } else if self.zero_active_since.is_none() {
            self.zero_active_since = Some(step);
        }
    }

    pub fn zero_active_since(&self) -> Option<u32> {
        self.zero_active_since
    }

    /// Cause of death at `step`, if any.
    pub fn death_cause(&self, step: u32, tumor_coverage_percent: f64) -> Option<DeathCause> {
        if let Some(since) = self.zero_active_since {
            if step - since > self.persistence_steps {
                return Some(DeathCause::ImmuneCollapse);
            }
        }
        if tumor_coverage_percent >= self.death_threshold_percent {
            return Some(DeathCause::TumorBurden);
        }
        None
    }

    /// Checks every terminal condition; death wins over clearance, clearance over the step ceiling.
    pub fn evaluate(&self, step: u32, tumor_cells: usize, tumor_coverage_percent: f64, max_steps: u32) -> Option<Outcome> {
        if let Some(cause) = self.death_cause(step, tumor_coverage_percent) {
            Some(Outcome::PatientDied(cause))
        } else if tumor_cells == 0 {
            Some(Outcome::TumorCleared)
        } else if step >= max_steps {
            Some(Outcome::MaxStepsReached)
        } else {
            None
        }
    }
}
