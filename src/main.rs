use vortsim::{
    MemorySnapshotStore, NullFrameSink, RandomSource, ScenarioConfig, SeededSource, Simulation,
};

use clap::Parser;
use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
struct Args {
    /// Scenario YAML file
    #[arg(short, default_value = "scenario.yaml")]
    file_name: String,
}

// load here to keep main clean
fn load_scenario_from_yaml() -> Result<ScenarioConfig> {
    let args = Args::parse();
    let config_path = PathBuf::from(args.file_name);
    let file = File::open(&config_path)?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;
    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let scenario_cfg = load_scenario_from_yaml()?;

    // Seed the random stream from the scenario, or from the wall clock;
    // either way the seed is logged so the run can be reproduced.
    let rng = match scenario_cfg.seed {
        Some(seed) => SeededSource::new(seed),
        None => SeededSource::from_clock(),
    };
    info!(seed = rng.seed(), "random seed");

    let mut sim = Simulation::build(
        scenario_cfg,
        Box::new(rng),
        Box::new(NullFrameSink),
        Box::new(MemorySnapshotStore::new()),
    )?;

    sim.run()
}
