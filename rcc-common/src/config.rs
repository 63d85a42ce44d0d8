use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{ExhaustionRates, SimParams};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Biological sex of the simulated patient. Drives the androgen load and the
/// regulatory T-cell recruitment law.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

impl FromStr for Sex {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "male" => Ok(Sex::Male),
            "female" => Ok(Sex::Female),
            other => anyhow::bail!("Unknown sex '{}', expected 'male' or 'female'.", other),
        }
    }
}

// Lattice dimensions (cells). The grid is always toroidal.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig { width: 150, height: 150 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PatientConfig {
    pub sex: Sex,
}

// Initial populations, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct InitialConditions {
    pub num_ici: usize,
    pub num_t_cells: usize,
    pub num_t_regs: usize,
    pub num_androgens: usize,
    pub num_tumor_cells: usize,
    /// Seed for the single random stream of the run. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions {
            num_ici: 2,
            num_t_cells: 373,
            num_t_regs: 0,
            num_androgens: 371,
            num_tumor_cells: 394,
            seed: None,
        }
    }
}

/// Per-mechanism tunables. Every field is a probability or an exhaustion
/// amount and must lie in [0, 1].
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RateConfig {
    /// Base spawn probability of a regulatory T-cell recruitment slot.
    pub p_treg_add: f64,
    pub t_cell_exhaustion_tumor: f64,
    pub t_cell_exhaustion_treg: f64,
    pub t_cell_exhaustion_androgen: f64,
    pub t_cell_activation_ici: f64,
    pub p_tumor_cell_add: f64,
    /// Reserved; carried into `SimParams` but not read by any behavior yet.
    pub ici_exhaustion: f64,
    /// Exhaustion removed from an exhausted T cell by a neighbouring ICI agent.
    pub ici_relief: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        RateConfig {
            p_treg_add: 0.05,
            t_cell_exhaustion_tumor: 0.04001731201879627,
            t_cell_exhaustion_treg: 0.16934907608400246,
            t_cell_exhaustion_androgen: 0.1666884991199096,
            t_cell_activation_ici: 0.15767026596715517,
            p_tumor_cell_add: 0.05,
            ici_exhaustion: 0.5098813436502578,
            ici_relief: 0.1,
        }
    }
}

// Run control and survival thresholds
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct RunConfig {
    pub search_radius: u32,
    pub max_steps: u32,
    /// Tumor coverage (% of grid cells) at which the patient is declared dead.
    pub death_threshold_percent: f64,
    /// Steps without any active T cell tolerated before the patient is declared dead.
    pub death_persistence_steps: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            search_radius: 3,
            max_steps: 2000,
            death_threshold_percent: 40.0,
            death_persistence_steps: 100,
        }
    }
}

/// Optional recruitment hooks driven by blood vessel density.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RecruitmentConfig {
    pub androgens: bool,
    pub t_cells: bool,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_stats: bool,
    pub save_agents_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    pub record_interval_steps: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: "rcc".to_string(),
            save_stats: true,
            save_agents_in_snapshot: false,
            format: Some("json".to_string()),
            record_interval_steps: 1,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub patient: PatientConfig,
    pub initial_conditions: InitialConditions,
    pub rates: RateConfig,
    pub run: RunConfig,
    pub recruitment: RecruitmentConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would silently distort an experiment.
    /// Nothing is clamped here.
    pub fn validate(&self) -> Result<()> {
        if self.grid.width == 0 || self.grid.height == 0 {
            anyhow::bail!(
                "Grid dimensions must be positive (got {}x{}).",
                self.grid.width,
                self.grid.height
            );
        }
        if (self.grid.width as u64) * (self.grid.height as u64) > u32::MAX as u64 {
            anyhow::bail!("Grid {}x{} has too many cells.", self.grid.width, self.grid.height);
        }

        let rates = &self.rates;
        let probabilities = [
            ("p_treg_add", rates.p_treg_add),
            ("t_cell_exhaustion_tumor", rates.t_cell_exhaustion_tumor),
            ("t_cell_exhaustion_treg", rates.t_cell_exhaustion_treg),
            ("t_cell_exhaustion_androgen", rates.t_cell_exhaustion_androgen),
            ("t_cell_activation_ici", rates.t_cell_activation_ici),
            ("p_tumor_cell_add", rates.p_tumor_cell_add),
            ("ici_exhaustion", rates.ici_exhaustion),
            ("ici_relief", rates.ici_relief),
        ];
        for (name, value) in probabilities {
            // NaN fails the range check as well
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{} must be within [0, 1] (got {}).", name, value);
            }
        }

        if self.run.search_radius == 0 {
            anyhow::bail!("search_radius must be at least 1.");
        }
        let widest = self.grid.width.max(self.grid.height);
        if self.run.search_radius > widest {
            anyhow::bail!(
                "search_radius {} exceeds the largest grid dimension ({}).",
                self.run.search_radius,
                widest
            );
        }
        if self.run.max_steps == 0 {
            anyhow::bail!("max_steps must be greater than 0.");
        }
        let threshold = self.run.death_threshold_percent;
        if !(threshold > 0.0 && threshold <= 100.0) {
            anyhow::bail!("death_threshold_percent must be within (0, 100] (got {}).", threshold);
        }
        if self.output.record_interval_steps == 0 {
            anyhow::bail!("record_interval_steps must be greater than 0.");
        }

        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let rates = &self.rates;
        SimParams {
            width: self.grid.width,
            height: self.grid.height,
            sex: self.patient.sex,
            search_radius: self.run.search_radius,
            exhaustion: ExhaustionRates {
                from_tumor: rates.t_cell_exhaustion_tumor,
                from_treg: rates.t_cell_exhaustion_treg,
                from_androgen: rates.t_cell_exhaustion_androgen,
                ici_activation: rates.t_cell_activation_ici,
            },
            p_treg_add: rates.p_treg_add,
            p_tumor_cell_add: rates.p_tumor_cell_add,
            ici_exhaustion: rates.ici_exhaustion,
            ici_relief: rates.ici_relief,
            max_steps: self.run.max_steps,
            death_threshold_percent: self.run.death_threshold_percent,
            death_persistence_steps: self.run.death_persistence_steps,
            recruit_androgens: self.recruitment.androgens,
            recruit_t_cells: self.recruitment.t_cells,
        }
    }
}
