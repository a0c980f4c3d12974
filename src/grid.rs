use crate::config::WorldConfig;
use crate::model::{Patch, Pos};
use anyhow::{Result, bail};
use rand::{Rng, seq::index};

/// Unit steps in perception priority order: East, West, North, South.
const DIRECTIONS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, -1), (0, 1)];

/// Toroidal grid of patches, stored row by row.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    patches: Vec<Patch>,
}

impl Grid {
    /// Create a full grid with one capacity per patch, row by row.
    pub fn new(width: usize, height: usize, capacities: &[f64]) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("grid must have at least one patch, but is {width}x{height}");
        }
        if capacities.len() != width * height {
            bail!(
                "grid of {width}x{height} needs {} capacities, but got {}",
                width * height,
                capacities.len()
            );
        }
        let patches = capacities
            .iter()
            .enumerate()
            .map(|(idx, &max_grain)| {
                let pos = Pos {
                    x: idx % width,
                    y: idx / width,
                };
                Patch::new(pos, max_grain)
            })
            .collect();
        Ok(Self {
            width,
            height,
            patches,
        })
    }

    /// Create a full grid where a random subset of patches is best land.
    pub fn generate<R: Rng>(cfg: &WorldConfig, rng: &mut R) -> Result<Self> {
        let n_patches = cfg.n_patches();
        let n_best = (n_patches as f64 * cfg.percent_best_land / 100.0).floor() as usize;

        let mut capacities = vec![1.0; n_patches];
        for idx in index::sample(rng, n_patches, n_best.min(n_patches)) {
            capacities[idx] = cfg.max_grain;
        }
        log::debug!("marked {n_best} of {n_patches} patches as best land");

        Self::new(cfg.width, cfg.height, &capacities)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Map any integer coordinates onto the torus.
    pub fn wrap(&self, x: i64, y: i64) -> Pos {
        Pos {
            x: x.rem_euclid(self.width as i64) as usize,
            y: y.rem_euclid(self.height as i64) as usize,
        }
    }

    pub fn index(&self, pos: Pos) -> usize {
        pos.y * self.width + pos.x
    }

    pub fn pos(&self, idx: usize) -> Pos {
        Pos {
            x: idx % self.width,
            y: idx / self.width,
        }
    }

    pub fn patch(&self, pos: Pos) -> &Patch {
        &self.patches[self.index(pos)]
    }

    #[cfg(test)]
    fn patch_mut(&mut self, pos: Pos) -> &mut Patch {
        let idx = self.index(pos);
        &mut self.patches[idx]
    }

    /// Richest patch visible from `pos` along the four cardinal directions.
    ///
    /// Candidates are visited nearest first (the current patch, then each
    /// distance in East, West, North, South order) and only a strictly
    /// larger grain level replaces the current choice. Ties therefore go to
    /// the nearest patch and then to the earlier direction, and a turtle
    /// already on an optimal patch stays there.
    pub fn best_in_sight(&self, pos: Pos, vision: u32) -> Pos {
        let mut best = pos;
        let mut best_grain = self.patch(pos).grain();
        for dist in 1..=i64::from(vision) {
            for (dx, dy) in DIRECTIONS {
                let cand = self.wrap(pos.x as i64 + dx * dist, pos.y as i64 + dy * dist);
                let grain = self.patch(cand).grain();
                if grain > best_grain {
                    best = cand;
                    best_grain = grain;
                }
            }
        }
        best
    }

    pub fn regrow(&mut self, amount: f64) {
        for patch in &mut self.patches {
            patch.regrow(amount);
        }
    }

    /// Share `rate` of every patch's grain equally among its four orthogonal
    /// neighbours.
    ///
    /// Reads come from the levels before the pass. Grain pushed beyond a
    /// patch's capacity is discarded.
    pub fn diffuse(&mut self, rate: f64) {
        if rate <= 0.0 {
            return;
        }
        let before: Vec<f64> = self.patches.iter().map(Patch::grain).collect();
        let mut after: Vec<f64> = before.iter().map(|grain| grain * (1.0 - rate)).collect();

        for (idx, &grain) in before.iter().enumerate() {
            let share = grain * rate / DIRECTIONS.len() as f64;
            let pos = self.pos(idx);
            for (dx, dy) in DIRECTIONS {
                let nbr = self.index(self.wrap(pos.x as i64 + dx, pos.y as i64 + dy));
                after[nbr] += share;
            }
        }

        for (patch, grain) in self.patches.iter_mut().zip(after) {
            patch.settle(grain);
        }
    }

    /// Harvest every occupied patch once.
    ///
    /// `occupancy[idx]` is the number of turtles on patch `idx`. Returns the
    /// grain share of each occupant, per patch.
    pub fn harvest(&mut self, occupancy: &[usize]) -> Result<Vec<f64>> {
        if occupancy.len() != self.patches.len() {
            bail!(
                "occupancy tally has {} entries for {} patches",
                occupancy.len(),
                self.patches.len()
            );
        }
        let shares = self
            .patches
            .iter_mut()
            .zip(occupancy)
            .map(|(patch, &n_occupants)| patch.harvest(n_occupants))
            .collect();
        Ok(shares)
    }

    /// Fail if any patch holds grain outside `[0, max_grain]`.
    pub fn check_invariants(&self) -> Result<()> {
        for patch in &self.patches {
            let grain = patch.grain();
            if !(0.0..=patch.max_grain()).contains(&grain) {
                bail!(
                    "patch at {:?} holds {grain} grain, outside [0, {}]",
                    patch.pos(),
                    patch.max_grain()
                );
            }
        }
        Ok(())
    }
}
