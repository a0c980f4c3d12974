use crate::stats::{Accumulator, AccumulatorReport, TimeSeries};
use crate::world::Snapshot;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::{fs, path::Path};

/// What the analysis keeps of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Snapshot of the last tick.
    pub last: Snapshot,
    /// Gini index of every tick, in order.
    pub gini_series: Vec<f64>,
    /// Lorenz curve of the population at the last tick.
    pub lorenz_curve: Vec<(f64, f64)>,
}

/// Observable measured on every run of a batch.
pub trait Obs {
    fn update(&mut self, run: &RunRecord) -> Result<()>;
    fn report(&self) -> Result<toml::Table>;
}

fn table_of<T: Serialize>(key: &str, report: &T) -> Result<toml::Table> {
    let value =
        toml::Value::try_from(report).with_context(|| format!("failed to serialize {key}"))?;
    let mut table = toml::Table::new();
    table.insert(key.to_string(), value);
    Ok(table)
}

/// Gini index at the last tick of each run.
struct FinalGini {
    acc: Accumulator,
}

impl FinalGini {
    fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FinalGini {
    fn update(&mut self, run: &RunRecord) -> Result<()> {
        self.acc.add(run.last.gini_index);
        Ok(())
    }

    fn report(&self) -> Result<toml::Table> {
        table_of("final_gini", &self.acc.report())
    }
}

#[derive(Serialize)]
struct ClassPercentReport {
    poor: AccumulatorReport,
    middle_class: AccumulatorReport,
    rich: AccumulatorReport,
}

/// Percentage of the population in each wealth class at the last tick.
struct FinalClassPercent {
    poor: Accumulator,
    middle: Accumulator,
    rich: Accumulator,
}

impl FinalClassPercent {
    fn new() -> Self {
        Self {
            poor: Accumulator::new(),
            middle: Accumulator::new(),
            rich: Accumulator::new(),
        }
    }
}

impl Obs for FinalClassPercent {
    fn update(&mut self, run: &RunRecord) -> Result<()> {
        let last = &run.last;
        let n_agt = last.poor_count + last.middle_count + last.rich_count;
        if n_agt == 0 {
            bail!("final tick has an empty population");
        }
        let percent = |count: usize| 100.0 * count as f64 / n_agt as f64;
        self.poor.add(percent(last.poor_count));
        self.middle.add(percent(last.middle_count));
        self.rich.add(percent(last.rich_count));
        Ok(())
    }

    fn report(&self) -> Result<toml::Table> {
        let report = ClassPercentReport {
            poor: self.poor.report(),
            middle_class: self.middle.report(),
            rich: self.rich.report(),
        };
        table_of("final_class_percent", &report)
    }
}

#[derive(Serialize)]
struct EquilGiniReport {
    level: AccumulatorReport,
    sem: AccumulatorReport,
    n_equilibrated: usize,
}

/// Long-run Gini level of each run, once the initial transient is discarded.
///
/// A run counts as equilibrated when the transient cut from its Gini series
/// ends before the midpoint. Otherwise the cut falls back to the midpoint:
/// in a 500-tick run the level is then the mean of ticks 251 to 500 and the
/// Gini may still be drifting, so longer runs are needed for a stable value.
struct EquilGini {
    level: Accumulator,
    sem: Accumulator,
    n_equilibrated: usize,
}

impl EquilGini {
    fn new() -> Self {
        Self {
            level: Accumulator::new(),
            sem: Accumulator::new(),
            n_equilibrated: 0,
        }
    }
}

impl Obs for EquilGini {
    fn update(&mut self, run: &RunRecord) -> Result<()> {
        if run.gini_series.is_empty() {
            bail!("run has no ticks");
        }
        let mut time_series = TimeSeries::new();
        for &gini in &run.gini_series {
            time_series.push(gini);
        }
        let report = time_series.report();
        self.level.add(report.mean);
        self.sem.add(report.sem);
        if report.is_equil {
            self.n_equilibrated += 1;
        }
        Ok(())
    }

    fn report(&self) -> Result<toml::Table> {
        let report = EquilGiniReport {
            level: self.level.report(),
            sem: self.sem.report(),
            n_equilibrated: self.n_equilibrated,
        };
        table_of("equil_gini", &report)
    }
}

#[derive(Serialize)]
struct AvgLorenzReport {
    population_fraction: Vec<f64>,
    wealth_fraction: Vec<f64>,
    wealth_fraction_std_dev: Vec<f64>,
}

/// Final Lorenz curve averaged point by point over runs.
///
/// The population is constant, so every run's curve has the same
/// population fractions and only the wealth fractions are averaged.
struct AvgLorenz {
    population_fraction: Vec<f64>,
    wealth_fraction: Vec<Accumulator>,
}

impl AvgLorenz {
    fn new() -> Self {
        Self {
            population_fraction: Vec::new(),
            wealth_fraction: Vec::new(),
        }
    }
}

impl Obs for AvgLorenz {
    fn update(&mut self, run: &RunRecord) -> Result<()> {
        let curve = &run.lorenz_curve;
        if curve.is_empty() {
            bail!("run has an empty Lorenz curve");
        }
        if self.wealth_fraction.is_empty() {
            self.population_fraction = curve.iter().map(|&(x, _)| x).collect();
            self.wealth_fraction = curve.iter().map(|_| Accumulator::new()).collect();
        } else if curve.len() != self.wealth_fraction.len() {
            bail!(
                "Lorenz curve has {} points, but previous runs have {}",
                curve.len(),
                self.wealth_fraction.len()
            );
        }
        for (acc, &(_, y)) in self.wealth_fraction.iter_mut().zip(curve) {
            acc.add(y);
        }
        Ok(())
    }

    fn report(&self) -> Result<toml::Table> {
        let reports: Vec<AccumulatorReport> =
            self.wealth_fraction.iter().map(Accumulator::report).collect();
        let report = AvgLorenzReport {
            population_fraction: self.population_fraction.clone(),
            wealth_fraction: reports.iter().map(|report| report.mean).collect(),
            // Undefined spreads of a single run are written as zero.
            wealth_fraction_std_dev: reports
                .iter()
                .map(|report| if report.std_dev.is_nan() { 0.0 } else { report.std_dev })
                .collect(),
        };
        table_of("avg_lorenz", &report)
    }
}

/// Collects observables over the runs of a batch.
pub struct Analyzer {
    n_runs: usize,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(FinalGini::new()),
            Box::new(FinalClassPercent::new()),
            Box::new(EquilGini::new()),
            Box::new(AvgLorenz::new()),
        ];
        Self {
            n_runs: 0,
            obs_ptr_vec,
        }
    }

    pub fn add_run(&mut self, run: &RunRecord) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.update(run).context("failed to update observable")?;
        }
        self.n_runs += 1;
        Ok(())
    }

    /// Number of runs added so far.
    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    pub fn report(&self) -> Result<toml::Table> {
        let mut table = toml::Table::new();
        table.insert("n_runs".to_string(), toml::Value::Integer(self.n_runs as i64));
        for obs in &self.obs_ptr_vec {
            table.extend(obs.report().context("failed to report observable")?);
        }
        Ok(table)
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents =
            toml::to_string_pretty(&self.report()?).context("failed to serialize results")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
