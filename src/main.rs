use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, trace, warn};
use rcc_simulation::{
    run_batch, survival_deviation, AgentType, Outcome, RunSummary, Sex, Simulation, SimulationConfig, Snapshot,
};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments for the tumor-immune simulation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Random seed (overrides initial_conditions.seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Patient sex, `male` or `female` (overrides patient.sex)
    #[arg(long)]
    sex: Option<Sex>,

    /// Step ceiling (overrides run.max_steps)
    #[arg(long)]
    max_steps: Option<u32>,

    /// Run this many consecutive seeds in parallel instead of a single run
    #[arg(long)]
    batch: Option<u64>,

    /// Target survival time in steps for the batch objective
    #[arg(long, default_value_t = 1024)]
    target_survival: u32,
}

/// One row of the per-step time series.
struct StepRow {
    step: u32,
    tumor_cells: usize,
    t_cells: usize,
    active_t_cells: usize,
    t_regs: usize,
    androgens: usize,
    mean_t_cell_exhaustion: f64,
    tumor_coverage_percent: f64,
}

impl StepRow {
    fn capture(sim: &Simulation) -> Self {
        let world = sim.world();
        Self {
            step: sim.current_step(),
            tumor_cells: world.count(AgentType::TumorCell),
            t_cells: world.count(AgentType::TCell),
            active_t_cells: world.active_t_cells(),
            t_regs: world.count(AgentType::TReg),
            androgens: world.count(AgentType::Androgen),
            mean_t_cell_exhaustion: world.mean_t_cell_exhaustion(),
            tumor_coverage_percent: world.tumor_coverage_percent(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    let args = Args::parse();
    info!("Starting RCC tumor-immune simulation...");

    // --- Load Configuration ---
    let mut config = if args.config.exists() {
        SimulationConfig::load(&args.config)?
    } else {
        warn!("Config file {:?} not found. Using built-in defaults.", args.config);
        SimulationConfig::default()
    };
    if let Some(seed) = args.seed {
        config.initial_conditions.seed = Some(seed);
    }
    if let Some(sex) = args.sex {
        config.patient.sex = sex;
    }
    if let Some(max_steps) = args.max_steps {
        config.run.max_steps = max_steps;
    }

    match args.batch {
        Some(n) => run_batch_mode(&config, n, args.target_survival),
        None => run_single(config),
    }
}

fn run_single(config: SimulationConfig) -> Result<()> {
    info!("Initializing simulation state...");
    let mut sim = Simulation::new(config)?;
    info!(
        "World initialized on a {}x{} grid with {} agents ({} patient).",
        sim.params().width,
        sim.params().height,
        sim.world().num_agents(),
        sim.params().sex
    );
    debug!("Simulation Parameters: {:#?}", sim.params());

    let record_interval_steps = sim.config().output.record_interval_steps.max(1);
    let max_steps = sim.params().max_steps;
    info!("Recording snapshot every {} steps.", record_interval_steps);

    let start_time = Instant::now();
    let mut previous_print_time = start_time;
    let print_interval_secs = 5.0;

    // --- Initial Snapshot (step 0) ---
    sim.record_snapshot();
    let mut timeseries = vec![StepRow::capture(&sim)];

    // --- Simulation Loop ---
    while sim.outcome().is_none() {
        let step_start_time = Instant::now();
        if let Err(e) = sim.step() {
            error!("Error during simulation step {}: {}", sim.current_step() + 1, e);
            anyhow::bail!("Simulation step failed.");
        }
        let step_duration = step_start_time.elapsed();
        let step = sim.current_step();
        timeseries.push(StepRow::capture(&sim));

        let current_time = Instant::now();
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= print_interval_secs;
        let is_record_step = step % record_interval_steps == 0;
        let is_last_step = sim.outcome().is_some();

        if is_record_step || is_last_step {
            sim.record_snapshot();
        }

        if should_print_status || is_last_step {
            info!(
                "Step [{}/{}] | Tumor: {} | T cells: {} ({} active) | T regs: {} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                step,
                max_steps,
                sim.count(AgentType::TumorCell),
                sim.count(AgentType::TCell),
                sim.world().active_t_cells(),
                sim.count(AgentType::TReg),
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;
        } else {
            trace!("Step [{}/{}] completed in {:.2} ms", step, max_steps, step_duration.as_secs_f64() * 1000.0);
        }
    }

    let outcome = sim.run_to_completion()?;
    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished after {} steps in {:.3} seconds: {}.",
        sim.current_step(),
        total_duration.as_secs_f64(),
        outcome
    );

    // --- Save Recorded Data ---
    let base = sim.config().output.base_filename.clone();
    if sim.config().output.save_stats {
        let output_format = sim.config().output.format.as_deref().unwrap_or("json");
        save_snapshots(sim.get_recorded_snapshots(), &base, output_format)?;
        save_timeseries(&timeseries, &format!("{}_timeseries.csv", base))?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}

fn save_snapshots(snapshots: &[Snapshot], base: &str, output_format: &str) -> Result<()> {
    info!("Saving {} recorded snapshots...", snapshots.len());
    match output_format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base);
            let file = File::create(&filename).with_context(|| format!("creating {}", filename))?;
            bincode::serialize_into(file, snapshots).context("serializing snapshots to bincode")?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base);
            let mut file = File::create(&filename).with_context(|| format!("creating {}", filename))?;
            rmp_serde::encode::write(&mut file, snapshots).context("serializing snapshots to MessagePack")?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base);
            let mut file = File::create(&filename).with_context(|| format!("creating {}", filename))?;
            let json_string = serde_json::to_string(snapshots).context("serializing snapshots to JSON")?;
            file.write_all(json_string.as_bytes())?;
            info!("All snapshots saved to {} ({} KB)", filename, json_string.len() / 1024);
        }
    }
    Ok(())
}

fn save_timeseries(rows: &[StepRow], filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename).with_context(|| format!("creating {}", filename))?;
    writer.write_record([
        "step",
        "tumor_cells",
        "t_cells",
        "active_t_cells",
        "t_regs",
        "androgens",
        "mean_t_cell_exhaustion",
        "tumor_coverage_percent",
    ])?;
    for row in rows {
        writer.write_record(&[
            row.step.to_string(),
            row.tumor_cells.to_string(),
            row.t_cells.to_string(),
            row.active_t_cells.to_string(),
            row.t_regs.to_string(),
            row.androgens.to_string(),
            format!("{:.6}", row.mean_t_cell_exhaustion),
            format!("{:.4}", row.tumor_coverage_percent),
        ])?;
    }
    writer.flush()?;
    info!("Time series saved to {}", filename);
    Ok(())
}

fn run_batch_mode(config: &SimulationConfig, n: u64, target_survival: u32) -> Result<()> {
    let first_seed = config.initial_conditions.seed.unwrap_or(0);
    let seeds = batch_seeds(first_seed, n)?;
    info!("Running {} seeds starting at {}...", seeds.len(), first_seed);

    let start_time = Instant::now();
    let summaries = run_batch(config, &seeds)?;
    info!("Batch finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    let died = summaries
        .iter()
        .filter(|s| matches!(s.outcome, Outcome::PatientDied(_)))
        .count();
    info!(
        "{} of {} patients died | mean |survival - {}| = {:.2} steps",
        died,
        summaries.len(),
        target_survival,
        survival_deviation(&summaries, target_survival)
    );

    let filename = format!("{}_batch.csv", config.output.base_filename);
    save_batch(&summaries, &filename)
}

/// `n` consecutive seeds starting at `first_seed`.
fn batch_seeds(first_seed: u64, n: u64) -> Result<Vec<u64>> {
    let Some(end) = first_seed.checked_add(n) else {
        anyhow::bail!("Seed range {} + {} overflows u64.", first_seed, n);
    };
    Ok((first_seed..end).collect())
}

fn save_batch(summaries: &[RunSummary], filename: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename).with_context(|| format!("creating {}", filename))?;
    writer.write_record(["seed", "outcome", "final_step", "tumor_cells", "t_cells", "t_regs"])?;
    for s in summaries {
        writer.write_record(&[
            s.seed.to_string(),
            s.outcome.to_string(),
            s.final_step.to_string(),
            s.tumor_cells.to_string(),
            s.t_cells.to_string(),
            s.t_regs.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Batch results saved to {}", filename);
    Ok(())
}
