use crate::agent::{Androgen, AgentKind, TumorCell};
use crate::behavior::step_agent;
use crate::population::run_recruitment;
use crate::survival::{Outcome, SimulationStatus, SurvivalTracker};
use crate::world::World;
use anyhow::Result;
use log::{debug, info, trace};
use rand::prelude::*;
use rcc_common::{AgentState, AgentType, InitialConditions, Position, Sex, SimParams, SimulationConfig, Snapshot};

/// Extra androgens placed for male patients.
const MALE_EXTRA_ANDROGENS: usize = 4;
/// Multiplier on the initial regulatory T-cell count for female patients.
const FEMALE_TREG_FACTOR: f64 = 1.1;

/// Manages the state and execution of one tumor-immune simulation run.
pub struct Simulation {
    /// The simulation configuration, including initial conditions and parameters.
    pub config: SimulationConfig,
    world: World,
    /// Number of completed steps.
    current_step: u32,
    survival: SurvivalTracker,
    status: SimulationStatus,
    /// Stores collected snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Validates the configuration, seeds the random stream and places the initial agents.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.initial_conditions.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let params = config.get_sim_params();
        let survival = SurvivalTracker::new(params.death_persistence_steps, params.death_threshold_percent);
        let mut world = World::new(params, rng);

        place_initial_agents(&mut world, &config.initial_conditions);
        world.verify_invariants()?;

        let mut sim = Self {
            config,
            world,
            current_step: 0,
            survival,
            status: SimulationStatus::Running,
            recorded_snapshots: Vec::new(),
        };

        // A degenerate start (no tumor, or already lethal coverage) ends the run at step 0.
        sim.evaluate_termination();
        if let SimulationStatus::Ended(outcome) = sim.status {
            info!("Run ended at construction: {}.", outcome);
        }
        Ok(sim)
    }

    /// Advances the simulation by exactly one step.
    ///
    /// Every agent alive at the start of the step acts once, in a freshly
    /// shuffled order. Agents removed mid-step are skipped; agents created
    /// mid-step first act on the next step.
    pub fn step(&mut self) -> Result<()> {
        // --- 1. Agent behaviors ---
        let mut order = self.world.agent_ids();
        order.shuffle(&mut self.world.rng);
        for id in order {
            step_agent(&mut self.world, id);
        }

        // --- 2. Population controller ---
        run_recruitment(&mut self.world);

        self.current_step += 1;

        // --- 3. Consistency ---
        if let Err(e) = self.world.verify_invariants() {
            anyhow::bail!("Invariant violated at step {}: {}", self.current_step, e);
        }

        // --- 4. Termination ---
        self.evaluate_termination();
        trace!(
            "Step {} | tumor {} | T cells {} ({} active) | T regs {}",
            self.current_step,
            self.world.count(AgentType::TumorCell),
            self.world.count(AgentType::TCell),
            self.world.active_t_cells(),
            self.world.count(AgentType::TReg)
        );
        Ok(())
    }

    /// Feeds the survival tracker and latches the first terminal outcome.
    fn evaluate_termination(&mut self) {
        self.survival.observe(self.current_step, self.world.active_t_cells());
        if self.status != SimulationStatus::Running {
            return;
        }
        if let Some(outcome) = self.survival.evaluate(
            self.current_step,
            self.world.count(AgentType::TumorCell),
            self.world.tumor_coverage_percent(),
            self.world.params.max_steps,
        ) {
            debug!("Terminal condition at step {}: {}.", self.current_step, outcome);
            self.status = SimulationStatus::Ended(outcome);
        }
    }

    /// Steps until a terminal condition holds and returns it.
    pub fn run_to_completion(&mut self) -> Result<Outcome> {
        loop {
            if let SimulationStatus::Ended(outcome) = self.status {
                match outcome {
                    Outcome::PatientDied(_) => info!("Simulation ended: Patient died at step {}", self.current_step),
                    Outcome::TumorCleared => info!("Simulation ended: Tumor defeated at step {}", self.current_step),
                    Outcome::MaxStepsReached => info!("Simulation ended: Max steps ({}) reached", self.world.params.max_steps),
                }
                return Ok(outcome);
            }
            self.step()?;
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    /// The terminal outcome, once one has been reached.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            SimulationStatus::Ended(outcome) => Some(outcome),
            SimulationStatus::Running => None,
        }
    }

    pub fn is_patient_alive(&self) -> bool {
        !matches!(self.outcome(), Some(Outcome::PatientDied(_)))
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Provides access to the simulation parameters.
    pub fn params(&self) -> &SimParams {
        &self.world.params
    }

    /// Provides access to the simulation configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn count(&self, agent_type: AgentType) -> usize {
        self.world.count(agent_type)
    }

    /// Metrics of the current step, including one record per live agent.
    pub fn metrics(&self) -> Snapshot {
        self.build_snapshot(true)
    }

    fn build_snapshot(&self, include_agents: bool) -> Snapshot {
        let world = &self.world;
        let t_cells = world.count(AgentType::TCell);
        let active_t_cells = world.active_t_cells();
        let exhausted_t_cells = world
            .agents_of_type(AgentType::TCell)
            .filter(|a| a.state() == AgentState::Exhausted)
            .count();
        let tumor_cells = world.count(AgentType::TumorCell);

        Snapshot {
            step: self.current_step,
            t_cells,
            active_t_cells,
            exhausted_t_cells,
            tumor_cells,
            t_regs: world.count(AgentType::TReg),
            androgens: world.count(AgentType::Androgen),
            ici: world.count(AgentType::Ici),
            mean_t_cell_exhaustion: world.mean_t_cell_exhaustion(),
            tumor_coverage_percent: world.tumor_coverage_percent(),
            blood_vessel_density: world.blood_vessel_density(),
            alive: self.is_patient_alive(),
            tumor_defeated: tumor_cells == 0,
            agents: include_agents.then(|| world.agents().map(|a| a.record()).collect()),
        }
    }

    /// Collects the current metrics and stores them as a Snapshot.
    pub fn record_snapshot(&mut self) {
        let snapshot = self.build_snapshot(self.config.output.save_agents_in_snapshot);
        debug!("Recording snapshot at step {}...", self.current_step);
        self.recorded_snapshots.push(snapshot);
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }
}

/// Places the initial populations, drawing from the world's stream in a fixed order:
/// T cells, T regs, androgens, ICI agents, then the tumor mass.
fn place_initial_agents(world: &mut World, initial: &InitialConditions) {
    let sex = world.params.sex;

    for _ in 0..initial.num_t_cells {
        let pos = world.random_position();
        world.spawn_t_cell(pos);
    }

    let num_t_regs = match sex {
        Sex::Male => initial.num_t_regs,
        Sex::Female => (initial.num_t_regs as f64 * FEMALE_TREG_FACTOR).floor() as usize,
    };
    for _ in 0..num_t_regs {
        let pos = world.random_position();
        world.spawn(AgentKind::TReg, pos);
    }

    let num_androgens = match sex {
        Sex::Male => initial.num_androgens + MALE_EXTRA_ANDROGENS,
        Sex::Female => initial.num_androgens,
    };
    for _ in 0..num_androgens {
        let pos = world.random_position();
        world.spawn(AgentKind::Androgen(Androgen::new()), pos);
    }

    for _ in 0..initial.num_ici {
        let pos = world.random_position();
        world.spawn(AgentKind::Ici, pos);
    }

    place_tumor_mass(world, initial.num_tumor_cells);

    debug!(
        "Placed {} T cells, {} T regs, {} androgens, {} ICI, {} tumor cells.",
        initial.num_t_cells, num_t_regs, num_androgens, initial.num_ici, initial.num_tumor_cells
    );
}

/// Grows the initial tumor as a random-walk cluster from a random seed cell.
/// Each cell lands on the next walk position when that cell is free, otherwise
/// it stays on the current one; the walk advances either way.
fn place_tumor_mass(world: &mut World, num_cells: usize) {
    if num_cells == 0 {
        return;
    }
    let mut current = world.random_position();
    let offsets = [-1i64, 0, 1];
    for _ in 0..num_cells {
        let dx = *offsets.choose(&mut world.rng).unwrap_or(&0);
        let dy = *offsets.choose(&mut world.rng).unwrap_or(&0);
        let next = world.grid.wrap(current.x as i64 + dx, current.y as i64 + dy);
        let pos: Position = if world.grid.is_empty(next) { next } else { current };
        world.spawn(AgentKind::TumorCell(TumorCell::new()), pos);
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::survival::DeathCause;

    fn small_config(width: u32, height: u32) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.width = width;
        config.grid.height = height;
        config.initial_conditions = InitialConditions {
            num_ici: 0,
            num_t_cells: 0,
            num_t_regs: 0,
            num_androgens: 0,
            num_tumor_cells: 0,
            seed: Some(42),
        };
        config
    }

    #[test]
    fn invalid_config_fails_before_any_step() {
        let mut config = small_config(0, 10);
        config.initial_conditions.num_tumor_cells = 3;
        assert!(Simulation::new(config).is_err());
    }

    #[test]
    fn initial_populations_follow_sex() {
        let mut config = small_config(20, 20);
        config.initial_conditions.num_t_regs = 10;
        config.initial_conditions.num_androgens = 5;
        config.initial_conditions.num_tumor_cells = 3;

        let male = Simulation::new(config.clone()).unwrap();
        assert_eq!(male.count(AgentType::TReg), 10);
        assert_eq!(male.count(AgentType::Androgen), 9);

        config.patient.sex = Sex::Female;
        let female = Simulation::new(config).unwrap();
        assert_eq!(female.count(AgentType::TReg), 11);
        assert_eq!(female.count(AgentType::Androgen), 5);
    }

    #[test]
    fn tumor_mass_is_a_connected_cluster() {
        let mut config = small_config(30, 30);
        config.initial_conditions.num_tumor_cells = 25;
        let sim = Simulation::new(config).unwrap();
        // ids follow placement order
        let cells: Vec<Position> = sim.world().agents_of_type(AgentType::TumorCell).map(|a| a.pos).collect();
        assert_eq!(cells.len(), 25);
        let axis = |a: u32, b: u32| {
            let d = a.abs_diff(b);
            d.min(30 - d)
        };
        for pair in cells.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(axis(a.x, b.x) <= 2 && axis(a.y, b.y) <= 2, "{:?} -> {:?}", a, b);
        }
    }

    #[test]
    fn zero_tumor_cells_is_cleared_immediately() {
        let mut config = small_config(10, 10);
        config.initial_conditions.num_t_cells = 3;
        let mut sim = Simulation::new(config).unwrap();
        assert_eq!(sim.outcome(), Some(Outcome::TumorCleared));
        assert_eq!(sim.run_to_completion().unwrap(), Outcome::TumorCleared);
        assert_eq!(sim.current_step(), 0);
        assert!(sim.metrics().tumor_defeated);
    }

    #[test]
    fn lethal_initial_coverage_ends_at_construction() {
        let mut config = small_config(10, 10);
        config.initial_conditions.num_tumor_cells = 40;
        let sim = Simulation::new(config).unwrap();
        assert_eq!(sim.outcome(), Some(Outcome::PatientDied(DeathCause::TumorBurden)));
        assert!(!sim.metrics().alive);
    }

    #[test]
    fn immune_collapse_after_persistence_window() {
        let mut config = small_config(20, 20);
        config.initial_conditions.num_tumor_cells = 1;
        config.rates.p_tumor_cell_add = 0.0;
        let mut sim = Simulation::new(config).unwrap();
        let outcome = sim.run_to_completion().unwrap();
        assert_eq!(outcome, Outcome::PatientDied(DeathCause::ImmuneCollapse));
        assert_eq!(sim.current_step(), 101);
    }

    #[test]
    fn step_ceiling_stops_the_run() {
        let mut config = small_config(20, 20);
        config.initial_conditions.num_tumor_cells = 1;
        config.rates.p_tumor_cell_add = 0.0;
        config.run.max_steps = 5;
        let mut sim = Simulation::new(config).unwrap();
        assert_eq!(sim.run_to_completion().unwrap(), Outcome::MaxStepsReached);
        assert_eq!(sim.current_step(), 5);
    }

    #[test]
    fn outcome_latches_after_termination() {
        let mut config = small_config(20, 20);
        config.initial_conditions.num_tumor_cells = 1;
        config.rates.p_tumor_cell_add = 0.0;
        config.run.max_steps = 3;
        let mut sim = Simulation::new(config).unwrap();
        sim.run_to_completion().unwrap();
        sim.step().unwrap();
        assert_eq!(sim.current_step(), 4);
        assert_eq!(sim.outcome(), Some(Outcome::MaxStepsReached));
    }

    #[test]
    fn snapshots_follow_record_settings() {
        let mut config = small_config(15, 15);
        config.initial_conditions.num_t_cells = 4;
        config.initial_conditions.num_tumor_cells = 6;
        let mut sim = Simulation::new(config.clone()).unwrap();
        sim.record_snapshot();
        sim.step().unwrap();
        sim.record_snapshot();
        let recorded = sim.get_recorded_snapshots();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].step, 1);
        assert!(recorded[0].agents.is_none());

        config.output.save_agents_in_snapshot = true;
        let mut sim = Simulation::new(config).unwrap();
        sim.record_snapshot();
        let agents = sim.get_recorded_snapshots()[0].agents.as_ref().unwrap();
        assert_eq!(agents.len(), sim.world().num_agents());
    }

    #[test]
    fn metrics_count_every_population() {
        let mut config = small_config(15, 15);
        config.initial_conditions.num_t_cells = 4;
        config.initial_conditions.num_ici = 2;
        config.initial_conditions.num_androgens = 1;
        config.initial_conditions.num_tumor_cells = 6;
        let sim = Simulation::new(config).unwrap();
        let m = sim.metrics();
        assert_eq!(m.step, 0);
        assert_eq!(m.t_cells, 4);
        assert_eq!(m.active_t_cells, 4);
        assert_eq!(m.exhausted_t_cells, 0);
        assert_eq!(m.ici, 2);
        assert_eq!(m.androgens, 5);
        assert_eq!(m.tumor_cells, 6);
        assert_eq!(m.mean_t_cell_exhaustion, 0.0);
        assert!(m.alive);
        assert!(!m.tumor_defeated);
        assert_eq!(m.agents.as_ref().unwrap().len(), 17);
    }
}
