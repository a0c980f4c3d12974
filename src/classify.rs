use serde::{Deserialize, Serialize};

/// Wealth class of a turtle relative to the richest turtle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WealthClass {
    Poor,
    MiddleClass,
    Rich,
}

/// Number of turtles in each wealth class.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub poor: usize,
    pub middle: usize,
    pub rich: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.poor + self.middle + self.rich
    }
}

/// Classify `wealth` against the maximum wealth of its population.
///
/// Poor up to a third of the maximum, middle class up to two thirds,
/// rich above. Everyone is poor when the maximum is zero.
pub fn classify(wealth: f64, max_wealth: f64) -> WealthClass {
    if max_wealth <= 0.0 || wealth <= max_wealth / 3.0 {
        WealthClass::Poor
    } else if wealth <= max_wealth * 2.0 / 3.0 {
        WealthClass::MiddleClass
    } else {
        WealthClass::Rich
    }
}

/// Class counts of a whole population. All zero for an empty one.
pub fn class_counts(wealths: &[f64]) -> ClassCounts {
    let max_wealth = wealths.iter().copied().fold(0.0, f64::max);
    let mut counts = ClassCounts::default();
    for &wealth in wealths {
        match classify(wealth, max_wealth) {
            WealthClass::Poor => counts.poor += 1,
            WealthClass::MiddleClass => counts.middle += 1,
            WealthClass::Rich => counts.rich += 1,
        }
    }
    counts
}
