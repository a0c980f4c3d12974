//! Inequality measures and running statistics.

use serde::{Deserialize, Serialize};

/// Lorenz curve of a wealth vector.
///
/// Returns `(population fraction, wealth fraction)` points from `(0, 0)` to
/// `(1, 1)`, one per agent in ascending order of wealth. When no one holds
/// any wealth the curve is the line of perfect equality.
pub fn lorenz_curve(wealths: &[f64]) -> Vec<(f64, f64)> {
    let sorted = sorted(wealths);
    let n = sorted.len() as f64;
    let total: f64 = sorted.iter().sum();

    let mut points = Vec::with_capacity(sorted.len() + 1);
    points.push((0.0, 0.0));
    let mut cum = 0.0;
    for (k, &wealth) in sorted.iter().enumerate() {
        cum += wealth;
        let pop_frac = (k + 1) as f64 / n;
        let wealth_frac = if total > 0.0 { cum / total } else { pop_frac };
        points.push((pop_frac, wealth_frac));
    }
    points
}

/// Gini index of a wealth vector, in `[0, 1]`.
///
/// Equals one minus twice the trapezoid-rule area under the agent-resolution
/// Lorenz curve. It is evaluated in the equivalent form
/// `sum_{i<j} (x_j - x_i) / (n * total)`, accumulated over the gaps between
/// consecutive sorted values, so that equal wealth gives exactly zero.
/// Empty, single-agent and all-zero vectors give zero.
pub fn gini_index(wealths: &[f64]) -> f64 {
    let n = wealths.len();
    if n < 2 {
        return 0.0;
    }
    let sorted = sorted(wealths);
    let total: f64 = sorted.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    // The gap between ranks k-1 and k separates (k - 1) poorer from (n - k + 1) richer agents.
    let pair_diff_sum: f64 = sorted
        .windows(2)
        .enumerate()
        .map(|(i, pair)| {
            let k = i + 2;
            (pair[1] - pair[0]) * ((k - 1) * (n - k + 1)) as f64
        })
        .sum();

    (pair_diff_sum / (n as f64 * total)).clamp(0.0, 1.0)
}

/// Aggregate reductions over a wealth vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WealthSummary {
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl WealthSummary {
    /// All fields are zero for an empty vector.
    pub fn of(wealths: &[f64]) -> Self {
        if wealths.is_empty() {
            return Self {
                total: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        Self {
            total: wealths.iter().sum(),
            min: wealths.iter().copied().fold(f64::INFINITY, f64::min),
            max: wealths.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

fn sorted(wealths: &[f64]) -> Vec<f64> {
    let mut sorted = wealths.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Running mean and variance (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub n_vals: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            n_vals: self.n_vals,
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Time series whose initial transient is detected and discarded on report.
pub struct TimeSeries {
    vals: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// First index of the equilibrated part of the series.
    pub i_equil: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub is_equil: bool,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self { vals: Vec::new() }
    }

    pub fn push(&mut self, val: f64) {
        self.vals.push(val);
    }

    pub fn report(&self) -> TimeSeriesReport {
        if self.vals.is_empty() {
            return TimeSeriesReport {
                i_equil: 0,
                mean: f64::NAN,
                std_dev: f64::NAN,
                sem: f64::NAN,
                is_equil: false,
            };
        }
        let i_equil = compute_opt_i_equil(&self.vals);
        let equil_vals = &self.vals[i_equil..];
        TimeSeriesReport {
            i_equil,
            mean: compute_mean(equil_vals),
            std_dev: compute_var(equil_vals).sqrt(),
            sem: compute_sem(equil_vals),
            is_equil: i_equil != self.vals.len() / 2,
        }
    }
}

impl Default for TimeSeries {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

fn compute_var(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = compute_mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}

/// Standard error of the mean of a correlated series (Flyvbjerg-Petersen blocking).
fn compute_sem(vals: &[f64]) -> f64 {
    let mut blk_vals = vals.to_vec();
    let mut n_vals = blk_vals.len();
    let mut sem2_ests = Vec::new();
    let mut sem2_errs = Vec::new();

    while n_vals >= 2 {
        let sem2_est = compute_var(&blk_vals) / n_vals as f64;
        let sem2_err = sem2_est * (2.0 / (n_vals as f64 - 1.0)).sqrt();
        sem2_ests.push(sem2_est);
        sem2_errs.push(sem2_err);

        blk_vals = blk_vals
            .chunks_exact(2)
            .map(|pair| (pair[0] + pair[1]) / 2.0)
            .collect();
        n_vals = blk_vals.len();
    }

    for (idx, &sem2_est) in sem2_ests.iter().enumerate() {
        let max_low = sem2_ests[idx..]
            .iter()
            .zip(&sem2_errs[idx..])
            .map(|(s, e)| s - e)
            .fold(f64::NEG_INFINITY, f64::max);

        if sem2_est > max_low {
            return sem2_est.sqrt();
        }
    }

    sem2_ests.last().copied().unwrap_or(f64::NAN).sqrt()
}

/// Start of the equilibrated part of a non-empty series (marginal standard error rule).
fn compute_opt_i_equil(vals: &[f64]) -> usize {
    let n_vals = vals.len();
    let mut min_mse = f64::INFINITY;
    let mut opt_i_equil = n_vals / 2;
    let n_idxs = n_vals.ilog2() + 1;

    for idx in 0..n_idxs {
        let i_equil = n_vals / 2_usize.pow(n_idxs - idx);
        let tail = &vals[i_equil..];
        let n_tail = tail.len();

        let mse = compute_var(tail) * (n_tail - 1) as f64 / n_tail.pow(2) as f64;

        if mse < min_mse {
            min_mse = mse;
            opt_i_equil = i_equil;
        }
    }

    opt_i_equil
}
