//! Simulation data types.

use serde::{Deserialize, Serialize};

/// Position of a patch on the grid.
///
/// Always in range for the grid that produced it, see [`crate::grid::Grid::wrap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

/// Grid cell holding a grain resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pos: Pos,
    grain: f64,
    max_grain: f64,
}

impl Patch {
    /// Create a patch filled to its capacity.
    pub fn new(pos: Pos, max_grain: f64) -> Self {
        Self {
            pos,
            grain: max_grain,
            max_grain,
        }
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn grain(&self) -> f64 {
        self.grain
    }

    pub fn max_grain(&self) -> f64 {
        self.max_grain
    }

    /// Grow `amount` grain, discarding whatever exceeds the capacity.
    pub fn regrow(&mut self, amount: f64) {
        self.grain = (self.grain + amount).min(self.max_grain);
    }

    /// Overwrite the grain level, discarding whatever exceeds the capacity.
    pub(crate) fn settle(&mut self, grain: f64) {
        self.grain = grain.min(self.max_grain);
    }

    /// Remove all grain and return the share of each of `shared` harvesters.
    pub fn harvest(&mut self, shared: usize) -> f64 {
        if shared == 0 {
            return 0.0;
        }
        let grain = self.grain;
        self.grain = 0.0;
        grain / shared as f64
    }
}

/// Foraging agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turtle {
    pub pos: Pos,
    pub wealth: f64,
    pub vision: u32,
    pub metabolism: u32,
    pub age: u32,
    pub life_expectancy: u32,
}

/// Why a turtle left the population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Death {
    /// Could not pay its metabolism.
    Starvation,
    /// Outlived its life expectancy.
    OldAge,
}

impl Turtle {
    /// Add the harvested grain, pay the metabolism and grow one tick older.
    ///
    /// A turtle that cannot pay keeps its wealth untouched and dies.
    pub fn consume_and_age(&mut self, harvested: f64) -> Option<Death> {
        self.wealth += harvested;
        let remaining = self.wealth - f64::from(self.metabolism);
        if remaining < 0.0 {
            return Some(Death::Starvation);
        }
        self.wealth = remaining;

        self.age += 1;
        if self.age > self.life_expectancy {
            return Some(Death::OldAge);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turtle(wealth: f64, metabolism: u32, life_expectancy: u32) -> Turtle {
        Turtle {
            pos: Pos { x: 0, y: 0 },
            wealth,
            vision: 1,
            metabolism,
            age: 0,
            life_expectancy,
        }
    }

    #[test]
    fn regrowth_is_capped() {
        let mut patch = Patch::new(Pos { x: 1, y: 2 }, 5.0);
        assert_eq!(patch.harvest(1), 5.0);
        patch.regrow(4.0);
        assert_eq!(patch.grain(), 4.0);
        patch.regrow(4.0);
        assert_eq!(patch.grain(), 5.0);
    }

    #[test]
    fn harvest_splits_evenly_and_empties() {
        let mut patch = Patch::new(Pos { x: 0, y: 0 }, 9.0);
        assert_eq!(patch.harvest(0), 0.0);
        assert_eq!(patch.grain(), 9.0);
        assert_eq!(patch.harvest(4), 2.25);
        assert_eq!(patch.grain(), 0.0);
        assert_eq!(patch.harvest(2), 0.0);
    }

    #[test]
    fn wealth_may_reach_exactly_zero() {
        let mut t = turtle(2.0, 5, 10);
        assert_eq!(t.consume_and_age(3.0), None);
        assert_eq!(t.wealth, 0.0);
        assert_eq!(t.age, 1);
    }

    #[test]
    fn unpaid_metabolism_is_starvation() {
        let mut t = turtle(2.0, 5, 10);
        assert_eq!(t.consume_and_age(1.0), Some(Death::Starvation));
        assert_eq!(t.wealth, 3.0);
        assert_eq!(t.age, 0);
    }

    #[test]
    fn exceeding_life_expectancy_is_old_age() {
        let mut t = turtle(100.0, 1, 1);
        assert_eq!(t.consume_and_age(0.0), None);
        assert_eq!(t.consume_and_age(0.0), Some(Death::OldAge));
        assert_eq!(t.wealth, 98.0);
    }
}
