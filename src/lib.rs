//! Agent-based simulation of wealth distribution.
//!
//! Turtles forage grain on a toroidal grid of patches, accumulate it as
//! wealth, age, die and are replaced. Every tick the population's wealth is
//! summarized as a Gini index, wealth class counts and aggregate wealth.

pub mod analysis;
pub mod classify;
pub mod config;
pub mod grid;
pub mod manager;
pub mod model;
pub mod scenario;
pub mod stats;
pub mod world;

pub use config::Config;
pub use scenario::Scenario;
pub use world::{Phase, Snapshot, TickOutcome, World};
