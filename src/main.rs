use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wealthdist::{Config, Scenario, manager::Manager};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    out_dir: PathBuf,

    /// TOML configuration file. Defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Run {
        /// One of default, inheritance or uniform.
        #[arg(long)]
        scenario: Option<String>,

        #[arg(long)]
        ticks: Option<u64>,

        #[arg(long)]
        runs: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mut cfg = match &args.config {
        Some(file) => Config::from_file(file).context("failed to load config")?,
        None => Config::default(),
    };

    match args.command {
        Command::Run {
            scenario,
            ticks,
            runs,
            seed,
        } => {
            if let Some(scenario) = scenario {
                cfg.run.scenario = scenario.parse::<Scenario>()?;
            }
            if let Some(ticks) = ticks {
                cfg.run.ticks = ticks;
            }
            if let Some(runs) = runs {
                cfg.run.runs = runs;
            }
            if seed.is_some() {
                cfg.run.seed = seed;
            }
            let mgr = Manager::new(&args.out_dir, cfg).context("failed to construct mgr")?;
            mgr.run_batch()?;
        }
        Command::Clean => {
            let mgr = Manager::new(&args.out_dir, cfg).context("failed to construct mgr")?;
            mgr.clean()?;
        }
    }

    Ok(())
}
