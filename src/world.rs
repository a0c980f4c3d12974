use crate::classify::{self, ClassCounts};
use crate::config::Config;
use crate::grid::Grid;
use crate::model::{Death, Pos, Turtle};
use crate::stats::{self, WealthSummary};
use anyhow::{Context, Result, bail};
use rand::{SeedableRng, seq::SliceRandom, seq::index};
use rand_chacha::ChaCha12Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

/// Lifecycle of a [`World`].
///
/// A world only exists once set up, so it starts out `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Running,
    Finished,
}

/// Result of a call to [`World::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The given tick was simulated.
    Advanced(u64),
    /// The tick budget is spent; nothing was simulated.
    Finished,
}

/// Aggregate statistics of the population after a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub gini_index: f64,
    pub poor_count: usize,
    pub middle_count: usize,
    pub rich_count: usize,
    pub total_wealth: f64,
    pub min_wealth: f64,
    pub max_wealth: f64,
}

impl Snapshot {
    pub fn new(tick: u64, wealths: &[f64]) -> Self {
        let ClassCounts { poor, middle, rich } = classify::class_counts(wealths);
        let summary = WealthSummary::of(wealths);
        Self {
            tick,
            gini_index: stats::gini_index(wealths),
            poor_count: poor,
            middle_count: middle,
            rich_count: rich,
            total_wealth: summary.total,
            min_wealth: summary.min,
            max_wealth: summary.max,
        }
    }
}

/// Distributions of newborn traits and positions.
struct Spawner {
    vision: Uniform<u32>,
    metabolism: Uniform<u32>,
    life_expectancy: Uniform<u32>,
    patch: Uniform<usize>,
}

impl Spawner {
    fn new(cfg: &Config) -> Result<Self> {
        let agents = &cfg.agents;
        Ok(Self {
            vision: Uniform::new_inclusive(agents.vision.min, agents.vision.max)
                .context("invalid vision range")?,
            metabolism: Uniform::new_inclusive(agents.metabolism.min, agents.metabolism.max)
                .context("invalid metabolism range")?,
            life_expectancy: Uniform::new_inclusive(
                agents.life_expectancy.min,
                agents.life_expectancy.max,
            )
            .context("invalid life expectancy range")?,
            patch: Uniform::new(0, cfg.world.n_patches()).context("invalid grid size")?,
        })
    }

    fn spawn(
        &self,
        cfg: &Config,
        pos: Pos,
        parent: Option<f64>,
        rng: &mut ChaCha12Rng,
    ) -> Turtle {
        let vision = self.vision.sample(rng);
        let metabolism = self.metabolism.sample(rng);
        let life_expectancy = self.life_expectancy.sample(rng);
        let wealth = cfg
            .run
            .scenario
            .initial_wealth(&cfg.agents, metabolism, parent, rng);
        Turtle {
            pos,
            wealth,
            vision,
            metabolism,
            age: 0,
            life_expectancy,
        }
    }
}

/// Simulation world.
///
/// Holds the configuration, the patch grid, the population and the random
/// number generator, and advances them one tick at a time.
pub struct World {
    cfg: Config,
    grid: Grid,
    turtles: Vec<Turtle>,
    rng: ChaCha12Rng,
    spawner: Spawner,
    phase: Phase,
    tick: u64,
    snapshot: Snapshot,
    occupancy: Vec<usize>,
}

impl World {
    /// Set up a world whose random draws all derive from `seed`.
    pub fn setup(cfg: Config, seed: u64) -> Result<Self> {
        Self::with_rng(cfg, ChaCha12Rng::seed_from_u64(seed))
    }

    /// Set up a world drawing from `rng`.
    ///
    /// Validates the configuration, marks the best land, fills every patch
    /// to capacity and places the initial population on distinct patches.
    pub fn with_rng(cfg: Config, mut rng: ChaCha12Rng) -> Result<Self> {
        cfg.validate().context("invalid configuration")?;
        let spawner = Spawner::new(&cfg)?;

        let grid = Grid::generate(&cfg.world, &mut rng).context("failed to generate grid")?;

        let n_agt = cfg.agents.population;
        let mut turtles = Vec::with_capacity(n_agt);
        for idx in index::sample(&mut rng, grid.len(), n_agt) {
            turtles.push(spawner.spawn(&cfg, grid.pos(idx), None, &mut rng));
        }

        let wealths: Vec<f64> = turtles.iter().map(|turtle| turtle.wealth).collect();
        let snapshot = Snapshot::new(0, &wealths);
        let occupancy = vec![0; grid.len()];

        let world = Self {
            cfg,
            grid,
            turtles,
            rng,
            spawner,
            phase: Phase::Ready,
            tick: 0,
            snapshot,
            occupancy,
        };
        world
            .check_invariants()
            .context("inconsistent initial state")?;

        Ok(world)
    }

    /// Advance the world by one tick.
    ///
    /// Once the tick budget is spent the world is finished and every further
    /// call returns [`TickOutcome::Finished`]. An internal consistency
    /// failure also finishes the world and is returned as an error.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.phase == Phase::Finished {
            return Ok(TickOutcome::Finished);
        }
        if self.tick >= self.cfg.run.ticks {
            log::debug!("tick budget of {} spent", self.cfg.run.ticks);
            self.phase = Phase::Finished;
            return Ok(TickOutcome::Finished);
        }

        self.phase = Phase::Running;
        let tick = self.tick + 1;
        if let Err(error) = self.perform_tick(tick) {
            self.phase = Phase::Finished;
            return Err(error.context(format!("failed to perform tick {tick}")));
        }

        Ok(TickOutcome::Advanced(tick))
    }

    fn perform_tick(&mut self, tick: u64) -> Result<()> {
        // Patches first: diffusion, then regrowth on growth ticks.
        self.grid.diffuse(self.cfg.world.diffusion_rate);
        if tick % self.cfg.world.grain_growth_interval == 0 {
            self.grid.regrow(self.cfg.world.num_grain_grown);
        }

        self.turtles.shuffle(&mut self.rng);

        self.move_turtles();

        let shares = self.harvest_patches().context("failed to harvest patches")?;

        let (n_starved, n_old) = self.consume_and_replace(&shares);

        self.check_invariants()?;

        self.tick = tick;
        self.snapshot = Snapshot::new(tick, &self.wealths());
        log::debug!(
            "tick {tick}: gini {:.4}, {n_starved} starved, {n_old} died of old age",
            self.snapshot.gini_index
        );

        Ok(())
    }

    fn move_turtles(&mut self) {
        // Moving never touches grain, so every turtle sees the same grid.
        for turtle in &mut self.turtles {
            turtle.pos = self.grid.best_in_sight(turtle.pos, turtle.vision);
        }
    }

    fn harvest_patches(&mut self) -> Result<Vec<f64>> {
        self.occupancy.fill(0);
        for turtle in &self.turtles {
            self.occupancy[self.grid.index(turtle.pos)] += 1;
        }
        self.grid.harvest(&self.occupancy)
    }

    fn consume_and_replace(&mut self, shares: &[f64]) -> (usize, usize) {
        let mut n_starved = 0;
        let mut n_old = 0;

        for i_agt in 0..self.turtles.len() {
            let turtle = &mut self.turtles[i_agt];
            let share = shares[self.grid.index(turtle.pos)];
            let Some(death) = turtle.consume_and_age(share) else {
                continue;
            };
            match death {
                Death::Starvation => n_starved += 1,
                Death::OldAge => n_old += 1,
            }
            log::trace!(
                "turtle {i_agt} died ({death:?}) at age {} with wealth {}",
                turtle.age,
                turtle.wealth
            );

            // The newborn takes the slot of the deceased, so it first acts next tick.
            let parent_wealth = turtle.wealth;
            let pos = self.grid.pos(self.spawner.patch.sample(&mut self.rng));
            self.turtles[i_agt] =
                self.spawner
                    .spawn(&self.cfg, pos, Some(parent_wealth), &mut self.rng);
        }

        (n_starved, n_old)
    }

    fn check_invariants(&self) -> Result<()> {
        let n_agt = self.turtles.len();
        if n_agt != self.cfg.agents.population {
            bail!(
                "population is {n_agt}, but must stay at {}",
                self.cfg.agents.population
            );
        }
        for (i_agt, turtle) in self.turtles.iter().enumerate() {
            if !(turtle.wealth.is_finite() && turtle.wealth >= 0.0) {
                bail!(
                    "turtle {i_agt} at {:?} has invalid wealth {}",
                    turtle.pos,
                    turtle.wealth
                );
            }
        }
        self.grid.check_invariants()
    }

    /// Statistics of the last completed tick (tick 0 right after setup).
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed ticks.
    pub fn ticks_done(&self) -> u64 {
        self.tick
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn turtles(&self) -> &[Turtle] {
        &self.turtles
    }

    pub fn wealths(&self) -> Vec<f64> {
        self.turtles.iter().map(|turtle| turtle.wealth).collect()
    }

    pub fn lorenz_curve(&self) -> Vec<(f64, f64)> {
        stats::lorenz_curve(&self.wealths())
    }

    pub fn class_counts(&self) -> ClassCounts {
        classify::class_counts(&self.wealths())
    }
}
