//! Runs a deterministic multipath simulation and prints its report.
//!
//! ```text
//! lia-sim --rounds 500 --algorithm reno
//! lia-sim --scenario paths.toml --format json
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mptcp_lia::config::{set_logger, ConfigArgs};
use mptcp_lia::simulation::{MultipathSimulation, Scenario};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "lia-sim")]
#[command(about = "Deterministic simulation of coupled multipath congestion control")]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    /// TOML file describing the paths; a Wi-Fi plus cellular pair otherwise.
    #[arg(long, env = "LIA_SCENARIO")]
    scenario: Option<PathBuf>,

    /// Overrides the scenario's round count.
    #[arg(long)]
    rounds: Option<u32>,

    /// Overrides the scenario's seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Simulate a conventional connection over the first path only.
    #[arg(long)]
    single_path: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.config.build()?;
    set_logger(Some(config.log_level))?;

    let mut scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::default(),
    };
    if let Some(rounds) = args.rounds {
        scenario.rounds = rounds;
    }
    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }

    let mut sim = if args.single_path {
        let profile = scenario
            .paths
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("scenario has no paths"))?;
        MultipathSimulation::single_path(config.congestion_control, profile, scenario.seed)?
    } else {
        MultipathSimulation::from_scenario(config.congestion_control, &scenario)?
    };
    let report = sim.run(scenario.rounds);

    match args.format {
        OutputFormat::Text => println!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
