//! Independent runs over many seeds, spread across the rayon pool.

use anyhow::Result;
use log::info;
use rayon::prelude::*;
use rcc_common::{AgentType, SimulationConfig};
use serde::{Deserialize, Serialize};

use crate::simulation::Simulation;
use crate::survival::Outcome;

/// Final state of one run in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub outcome: Outcome,
    pub final_step: u32,
    pub tumor_cells: usize,
    pub t_cells: usize,
    pub t_regs: usize,
}

/// Runs one simulation per seed in parallel. Each run owns its world and random
/// stream, so results match sequential runs with the same seeds. Summaries are
/// returned in seed order; the first failing run aborts the batch.
pub fn run_batch(config: &SimulationConfig, seeds: &[u64]) -> Result<Vec<RunSummary>> {
    config.validate()?;
    info!("Running batch of {} seeds on {} threads.", seeds.len(), rayon::current_num_threads());

    seeds
        .par_iter()
        .map(|&seed| -> Result<RunSummary> {
            let mut run_config = config.clone();
            run_config.initial_conditions.seed = Some(seed);
            let mut sim = Simulation::new(run_config)?;
            let outcome = sim.run_to_completion()?;
            Ok(RunSummary {
                seed,
                outcome,
                final_step: sim.current_step(),
                tumor_cells: sim.count(AgentType::TumorCell),
                t_cells: sim.count(AgentType::TCell),
                t_regs: sim.count(AgentType::TReg),
            })
        })
        .collect()
}

/// Mean absolute distance between each run's final step and `target_step`.
/// Zero for an empty batch.
pub fn survival_deviation(summaries: &[RunSummary], target_step: u32) -> f64 {
    if summaries.is_empty() {
        return 0.0;
    }
    let total: f64 = summaries
        .iter()
        .map(|s| (s.final_step as f64 - target_step as f64).abs())
        .sum();
    total / summaries.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(final_step: u32) -> RunSummary {
        RunSummary {
            seed: 0,
            outcome: Outcome::MaxStepsReached,
            final_step,
            tumor_cells: 0,
            t_cells: 0,
            t_regs: 0,
        }
    }

    #[test]
    fn deviation_is_mean_absolute_error() {
        let runs = [summary(1000), summary(1050), summary(1024)];
        assert!((survival_deviation(&runs, 1024) - 50.0 / 3.0).abs() < 1e-12);
        assert_eq!(survival_deviation(&[], 1024), 0.0);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = SimulationConfig::default();
        config.rates.p_tumor_cell_add = 2.0;
        assert!(run_batch(&config, &[1, 2]).is_err());
    }
}
