use crate::scenario::Scenario;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Grid and grain parameters.
    pub world: WorldConfig,
    /// Population and trait parameters.
    pub agents: AgentConfig,
    /// Scenario and run length parameters.
    pub run: RunConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Number of patch columns.
    pub width: usize,
    /// Number of patch rows.
    pub height: usize,

    /// Percentage (0 to 100) of patches that are best land.
    pub percent_best_land: f64,
    /// Grain capacity of best land. Every other patch holds at most 1.
    pub max_grain: f64,

    /// Grain added to every patch on a growth tick.
    pub num_grain_grown: f64,
    /// Number of ticks between growth ticks.
    pub grain_growth_interval: u64,

    /// Fraction of each patch's grain shared with its four neighbours per tick.
    pub diffusion_rate: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 51,
            height: 51,
            percent_best_land: 10.0,
            max_grain: 50.0,
            num_grain_grown: 4.0,
            grain_growth_interval: 1,
            diffusion_rate: 0.0,
        }
    }
}

impl WorldConfig {
    pub fn n_patches(&self) -> usize {
        self.width * self.height
    }
}

/// Inclusive integer range used for agent traits.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntRange {
    pub min: u32,
    pub max: u32,
}

impl IntRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Number of turtles, constant for the whole run.
    pub population: usize,

    pub vision: IntRange,
    pub metabolism: IntRange,
    pub life_expectancy: IntRange,

    /// Upper bound of the random grain bonus added to metabolism
    /// under the default wealth rule.
    pub wealth_bonus_max: u32,
    /// Starting wealth of every turtle in the uniform scenario.
    pub uniform_wealth: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            population: 250,
            vision: IntRange::new(1, 5),
            metabolism: IntRange::new(1, 15),
            life_expectancy: IntRange::new(1, 83),
            wealth_bonus_max: 50,
            uniform_wealth: 50.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Wealth initialization and inheritance policy.
    pub scenario: Scenario,
    /// Tick budget of each run.
    pub ticks: u64,
    /// Number of independent runs in a batch.
    pub runs: usize,
    /// Base seed. Drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::Default,
            ticks: 500,
            runs: 1,
            seed: None,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML. Missing keys take their default values,
    /// unknown keys are rejected.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Check every parameter against its admissible range.
    pub fn validate(&self) -> Result<()> {
        let world = &self.world;
        check_num(world.width, 1..=10_000).context("invalid grid width")?;
        check_num(world.height, 1..=10_000).context("invalid grid height")?;
        check_num(world.percent_best_land, 0.0..=100.0)
            .context("invalid percentage of best land")?;
        check_num(world.max_grain, 1.0..=1e9).context("invalid maximum grain")?;
        check_num(world.num_grain_grown, 0.0..=1e9).context("invalid grain growth amount")?;
        check_num(world.grain_growth_interval, 1..=1_000_000)
            .context("invalid grain growth interval")?;
        check_num(world.diffusion_rate, 0.0..=1.0).context("invalid diffusion rate")?;

        let agents = &self.agents;
        check_num(agents.population, 1..=world.n_patches())
            .context("invalid population (must fit on distinct patches)")?;
        check_range(agents.vision, 1..=1_000).context("invalid vision range")?;
        check_range(agents.metabolism, 1..=1_000_000).context("invalid metabolism range")?;
        check_range(agents.life_expectancy, 1..=1_000_000)
            .context("invalid life expectancy range")?;
        check_num(agents.wealth_bonus_max, 0..=1_000_000_000)
            .context("invalid wealth bonus maximum")?;
        check_num(agents.uniform_wealth, 0.0..=1e12).context("invalid uniform wealth")?;

        let run = &self.run;
        check_num(run.ticks, 1..=100_000_000).context("invalid number of ticks")?;
        check_num(run.runs, 1..=100_000).context("invalid number of runs")?;

        Ok(())
    }
}

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_range<R>(int_range: IntRange, bounds: R) -> Result<()>
where
    R: RangeBounds<u32> + Debug + Clone,
{
    let IntRange { min, max } = int_range;
    if min > max {
        bail!("range minimum {min} exceeds maximum {max}");
    }
    check_num(min, bounds.clone()).context("invalid range minimum")?;
    check_num(max, bounds).context("invalid range maximum")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.world.n_patches(), 51 * 51);
        assert_eq!(cfg.run.scenario, Scenario::Default);
    }

    #[test]
    fn partial_toml_takes_defaults() {
        let cfg: Config = toml::from_str(
            "[world]\nwidth = 10\nheight = 12\n\n[run]\nscenario = \"inheritance\"\nseed = 7\n",
        )
        .unwrap();
        assert_eq!(cfg.world.width, 10);
        assert_eq!(cfg.world.height, 12);
        assert_eq!(cfg.world.max_grain, 50.0);
        assert_eq!(cfg.agents.population, 250);
        assert_eq!(cfg.run.scenario, Scenario::Inheritance);
        assert_eq!(cfg.run.seed, Some(7));
    }

    #[test]
    fn unknown_keys_and_scenarios_are_rejected() {
        assert!(toml::from_str::<Config>("[world]\nwidht = 10\n").is_err());
        assert!(toml::from_str::<Config>("[run]\nscenario = \"communism\"\n").is_err());
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let mut cfg = Config::default();
        cfg.agents.vision = IntRange::new(5, 1);
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.agents.metabolism = IntRange::new(0, 3);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_sizes_are_rejected() {
        let mut cfg = Config::default();
        cfg.world.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.agents.population = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.world.width = 5;
        cfg.world.height = 5;
        cfg.agents.population = 26;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn out_of_range_fractions_are_rejected() {
        let mut cfg = Config::default();
        cfg.world.diffusion_rate = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.world.percent_best_land = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
