//! Recruitment rules run once per step after every agent has acted.

use rand::prelude::*;
use rcc_common::{AgentType, Sex};

use crate::agent::{Androgen, AgentKind};
use crate::world::World;

const TREG_QUOTA_SLOTS: i64 = 10;
const TREG_PROBABILITY_FLOOR: f64 = 0.01;
const TREG_LOGISTIC_MIDPOINT: f64 = 0.5;
const TREG_LOGISTIC_STEEPNESS: f64 = 5.0;
const MALE_TREG_CAP_DIVISOR: f64 = 1.3;

const T_CELL_RECRUIT_DENSITY_THRESHOLD: f64 = 0.1;
const T_CELL_RECRUIT_SCALE: f64 = 5.0;

/// Largest regulatory T-cell population recruitment may reach.
pub fn treg_cap(sex: Sex, t_cells: usize) -> usize {
    match sex {
        Sex::Female => t_cells,
        Sex::Male => (t_cells as f64 / MALE_TREG_CAP_DIVISOR).floor() as usize,
    }
}

/// Recruitment slots for one step: 10 at rest, shrinking as T cells tire.
pub fn treg_quota(mean_exhaustion: f64) -> usize {
    (TREG_QUOTA_SLOTS - (mean_exhaustion * 10.0).floor() as i64).max(0) as usize
}

/// Spawn probability of each recruitment slot.
///
/// `p = base / (1 + exp((mean - 0.5) * 5))`, doubled (capped at 1) for female
/// patients, never below 0.01.
pub fn treg_spawn_probability(base: f64, mean_exhaustion: f64, sex: Sex) -> f64 {
    let mut p = base / (1.0 + ((mean_exhaustion - TREG_LOGISTIC_MIDPOINT) * TREG_LOGISTIC_STEEPNESS).exp());
    if sex == Sex::Female {
        p = (p * 2.0).min(1.0);
    }
    p.max(TREG_PROBABILITY_FLOOR)
}

/// Regulatory T-cell recruitment. Returns the number of cells spawned.
pub fn recruit_t_regs(world: &mut World) -> usize {
    let sex = world.params.sex;
    let t_cells = world.count(AgentType::TCell);
    let mut t_regs = world.count(AgentType::TReg);
    let mean_exhaustion = world.mean_t_cell_exhaustion();

    let cap = treg_cap(sex, t_cells);
    let quota = if t_regs > cap { 0 } else { treg_quota(mean_exhaustion) };
    let p = treg_spawn_probability(world.params.p_treg_add, mean_exhaustion, sex);

    let mut spawned = 0;
    for _ in 0..quota {
        if t_regs >= cap {
            break;
        }
        if world.rng.random::<f64>() < p {
            let pos = world.random_position();
            world.spawn(AgentKind::TReg, pos);
            t_regs += 1;
            spawned += 1;
        }
    }

    if spawned > 0 {
        log::debug!(
            "Recruited {} T regs (mean exhaustion {:.3}, p {:.4}, population {}/{}).",
            spawned, mean_exhaustion, p, t_regs, cap
        );
    }
    spawned
}

/// Androgen recruitment driven by blood vessel density; stronger in male patients.
pub fn recruit_androgens(world: &mut World) -> usize {
    let factor = match world.params.sex {
        Sex::Male => 1.5,
        Sex::Female => 0.5,
    };
    let p = world.blood_vessel_density() * factor;
    if world.rng.random::<f64>() < p {
        let pos = world.random_position();
        world.spawn(AgentKind::Androgen(Androgen::new()), pos);
        log::debug!("Recruited an androgen (p {:.4}).", p);
        1
    } else {
        0
    }
}

/// Reactive T-cell recruitment once the tumor is dense enough.
pub fn recruit_t_cells(world: &mut World) -> usize {
    let density = world.blood_vessel_density();
    if density <= T_CELL_RECRUIT_DENSITY_THRESHOLD {
        return 0;
    }
    let n = (density * T_CELL_RECRUIT_SCALE).floor() as usize;
    for _ in 0..n {
        let pos = world.random_position();
        world.spawn_t_cell(pos);
    }
    if n > 0 {
        log::debug!("Recruited {} T cells (vessel density {:.3}).", n, density);
    }
    n
}

/// Runs every enabled recruitment rule in order.
pub fn run_recruitment(world: &mut World) {
    recruit_t_regs(world);
    if world.params.recruit_androgens {
        recruit_androgens(world);
    }
    if world.params.recruit_t_cells {
        recruit_t_cells(world);
    }
}
