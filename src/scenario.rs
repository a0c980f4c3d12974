use crate::config::AgentConfig;
use anyhow::{Error, Result, bail};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Wealth initialization and inheritance policy.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Every turtle starts with its metabolism plus a random grain bonus.
    Default,
    /// Newborns receive the whole wealth of the turtle they replace.
    Inheritance,
    /// Every turtle starts with the same fixed wealth.
    Uniform,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Default, Scenario::Inheritance, Scenario::Uniform];

    /// Starting wealth of a turtle with the given metabolism.
    ///
    /// `parent` is the wealth left by the deceased turtle being replaced,
    /// or `None` for the initial population.
    pub fn initial_wealth<R: Rng>(
        self,
        agents: &AgentConfig,
        metabolism: u32,
        parent: Option<f64>,
        rng: &mut R,
    ) -> f64 {
        match (self, parent) {
            (Scenario::Uniform, _) => agents.uniform_wealth,
            (Scenario::Inheritance, Some(wealth)) => wealth,
            (Scenario::Default | Scenario::Inheritance, _) => {
                let bonus = rng.random_range(0..=agents.wealth_bonus_max);
                f64::from(metabolism) + f64::from(bonus)
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Default => "default",
            Scenario::Inheritance => "inheritance",
            Scenario::Uniform => "uniform",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match Scenario::ALL.into_iter().find(|scenario| scenario.name() == s) {
            Some(scenario) => Ok(scenario),
            None => bail!("unknown scenario {s:?} (expected default, inheritance or uniform)"),
        }
    }
}
