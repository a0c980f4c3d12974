use crate::analysis::{Analyzer, RunRecord};
use crate::config::Config;
use crate::world::{Snapshot, TickOutcome, World};
use anyhow::{Context, Result};
use glob::glob;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Column names of the per-run CSV files.
pub const CSV_HEADER: &str =
    "tick,gini_index,poor_count,middle_count,rich_count,total_wealth,min_wealth,max_wealth";

/// Runs batches of independent simulations and manages their output files.
pub struct Manager {
    out_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(out_dir: P, cfg: Config) -> Result<Self> {
        let out_dir = out_dir.as_ref().to_path_buf();
        cfg.validate().context("invalid configuration")?;
        log::info!("{cfg:#?}");
        Ok(Self { out_dir, cfg })
    }

    /// Run every simulation of the batch in parallel, streaming each run to
    /// its CSV file, then write the batch summary.
    ///
    /// A failed run does not stop the others: the summary covers the runs
    /// that completed and the first failure is returned afterwards.
    pub fn run_batch(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {:?}", self.out_dir))?;
        self.clean().context("failed to remove previous results")?;

        let seed = match self.cfg.run.seed {
            Some(seed) => seed,
            None => rand::rng().random(),
        };
        let n_runs = self.cfg.run.runs;
        log::info!(
            "running {n_runs} {} runs of {} ticks with seed {seed}",
            self.cfg.run.scenario,
            self.cfg.run.ticks
        );

        let results: Vec<Result<RunRecord>> = (0..n_runs)
            .into_par_iter()
            .map(|run_idx| {
                let run_file = self.run_file(run_idx);
                write_run(&run_file, &self.cfg, seed, run_idx)
                    .with_context(|| format!("failed to run {run_idx} into {run_file:?}"))
            })
            .collect();

        let mut analyzer = Analyzer::new();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(record) => analyzer.add_run(&record).context("failed to analyze run")?,
                Err(error) => {
                    log::error!("{error:#}");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }
        let n_done = analyzer.n_runs();
        log::info!("wrote {n_done} of {n_runs} run files to {:?}", self.out_dir);

        if n_done > 0 {
            let summary_file = self.summary_file();
            analyzer
                .save_results(&summary_file)
                .context("failed to save results")?;
            log::info!("saved {summary_file:?}");
        }

        match first_error {
            Some(error) => {
                let n_failed = n_runs - n_done;
                Err(error.context(format!("{n_failed} of {n_runs} runs failed")))
            }
            None => Ok(()),
        }
    }

    /// Remove every run file and the summary from the output directory.
    pub fn clean(&self) -> Result<()> {
        let pattern = self.out_dir.join("run-*.csv");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_file in glob(pattern).context("failed to glob run files")? {
            let run_file = run_file.context("failed to read glob entry")?;
            if !run_file.is_file() {
                continue;
            }
            fs::remove_file(&run_file).with_context(|| format!("failed to remove {run_file:?}"))?;
            log::info!("removed {run_file:?}");
        }

        let summary_file = self.summary_file();
        if summary_file.exists() {
            fs::remove_file(&summary_file)
                .with_context(|| format!("failed to remove {summary_file:?}"))?;
            log::info!("removed {summary_file:?}");
        }

        Ok(())
    }

    pub fn run_file(&self, run_idx: usize) -> PathBuf {
        self.out_dir.join(format!("run-{run_idx:04}.csv"))
    }

    pub fn summary_file(&self) -> PathBuf {
        self.out_dir.join("summary.toml")
    }
}

/// Simulate one run of a batch until its tick budget is spent, writing one
/// CSV row per tick to `writer` as it goes.
///
/// Run `run_idx` draws from ChaCha stream `run_idx` of `seed`, so every run
/// is independent of the others and reproducible on its own.
pub fn simulate_run<W: Write>(
    cfg: &Config,
    seed: u64,
    run_idx: usize,
    writer: &mut W,
) -> Result<RunRecord> {
    let mut rng = ChaCha12Rng::seed_from_u64(seed);
    rng.set_stream(run_idx as u64);

    let mut world = World::with_rng(cfg.clone(), rng).context("failed to set up world")?;
    log::info!("started run {run_idx}");

    writeln!(writer, "{CSV_HEADER}").context("failed to write header")?;
    let mut gini_series = Vec::new();
    while let TickOutcome::Advanced(_) = world.tick()? {
        let snapshot = world.snapshot();
        write_row(writer, snapshot)?;
        gini_series.push(snapshot.gini_index);
    }

    let last = world.snapshot().clone();
    log::info!("finished run {run_idx} with final gini {:.4}", last.gini_index);

    Ok(RunRecord {
        last,
        gini_series,
        lorenz_curve: world.lorenz_curve(),
    })
}

fn write_row<W: Write>(writer: &mut W, s: &Snapshot) -> Result<()> {
    writeln!(
        writer,
        "{},{},{},{},{},{},{},{}",
        s.tick,
        s.gini_index,
        s.poor_count,
        s.middle_count,
        s.rich_count,
        s.total_wealth,
        s.min_wealth,
        s.max_wealth
    )
    .with_context(|| format!("failed to write tick {}", s.tick))
}

fn write_run(file: &Path, cfg: &Config, seed: u64, run_idx: usize) -> Result<RunRecord> {
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);
    let record = simulate_run(cfg, seed, run_idx, &mut writer)?;
    writer.flush().context("failed to flush writer stream")?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> Config {
        let mut cfg = Config::default();
        cfg.world.width = 12;
        cfg.world.height = 12;
        cfg.agents.population = 30;
        cfg.run.ticks = 20;
        cfg
    }

    fn csv_of(cfg: &Config, seed: u64, run_idx: usize) -> (String, RunRecord) {
        let mut buf = Vec::new();
        let record = simulate_run(cfg, seed, run_idx, &mut buf).unwrap();
        (String::from_utf8(buf).unwrap(), record)
    }

    #[test]
    fn runs_are_reproducible_and_distinct() {
        let cfg = small_cfg();
        let (csv_a, record_a) = csv_of(&cfg, 42, 0);
        let (csv_b, record_b) = csv_of(&cfg, 42, 0);
        let (csv_c, _) = csv_of(&cfg, 42, 1);
        assert_eq!(record_a.gini_series.len(), 20);
        assert_eq!(csv_a, csv_b);
        assert_eq!(record_a, record_b);
        assert_ne!(csv_a, csv_c);
    }

    #[test]
    fn csv_has_header_and_one_row_per_tick() {
        let (text, record) = csv_of(&small_cfg(), 1, 0);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 21);
        assert!(lines[1].starts_with("1,"));
        assert!(lines[20].starts_with("20,"));
        assert!(lines.iter().all(|line| line.split(',').count() == 8));

        let last_gini: f64 = lines[20].split(',').nth(1).unwrap().parse().unwrap();
        assert_eq!(record.last.tick, 20);
        assert_eq!(record.last.gini_index, last_gini);
        assert_eq!(record.gini_series[19], last_gini);
    }

    #[test]
    fn record_holds_the_final_lorenz_curve() {
        let (_, record) = csv_of(&small_cfg(), 3, 0);
        assert_eq!(record.lorenz_curve.len(), 31);
        assert_eq!(record.lorenz_curve[0], (0.0, 0.0));
        assert_eq!(record.lorenz_curve[30].0, 1.0);
        assert!((record.lorenz_curve[30].1 - 1.0).abs() < 1e-9);
    }
}
