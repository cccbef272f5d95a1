//! Owned copies of simulation state and summary statistics.
//!
//! A [`WorldSnapshot`] is taken between ticks by downloading every simulation
//! buffer. It holds no device handles and can be kept, compared or inspected
//! freely after the simulator moves on or is disposed.
//!
//! ## Statistics
//!
//! [`PopulationStats`] are reduced from a snapshot in two phases: rayon workers
//! fold disjoint id ranges into thread-local accumulators, then the
//! accumulators are merged with an associative `combine`. Integer totals are
//! exact, and float totals are summed in `f64`, so the result does not depend
//! on the number of workers beyond rounding.

use rayon::prelude::*;

use crate::engine::types::{GridGeneration, Tick, EMPTY_CELL, NUM_DIRECTIONS, OBJECT_WALL};

/// Every simulation buffer, copied to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSnapshot {
    /// Tick counter when the snapshot was taken.
    pub tick: Tick,
    /// World width in cells.
    pub width: usize,
    /// World height in cells.
    pub height: usize,
    /// Value of the device flag `writing_to_a`.
    pub writing_to_a: i32,
    /// Occupancy generation A.
    pub grid_a: Vec<i32>,
    /// Occupancy generation B.
    pub grid_b: Vec<i32>,
    /// Object per cell.
    pub objects: Vec<u8>,
    /// Food per cell.
    pub food: Vec<f32>,
    /// Per-cell entropy words.
    pub random: Vec<i32>,
    /// Creature x.
    pub x: Vec<i32>,
    /// Creature y.
    pub y: Vec<i32>,
    /// Creature x before the last action.
    pub prev_x: Vec<i32>,
    /// Creature y before the last action.
    pub prev_y: Vec<i32>,
    /// Energy per creature.
    pub energy: Vec<i16>,
    /// Hue per creature, in radians.
    pub hue: Vec<f32>,
    /// Facing direction per creature.
    pub direction: Vec<u8>,
    /// Last decided action per creature.
    pub action: Vec<u8>,
    /// Whether each creature's last action succeeded.
    pub last_success: Vec<u8>,
    /// Flat weights of every network.
    pub weights: Vec<f32>,
    /// Flat neuron outputs of every network.
    pub outputs: Vec<f32>,
}

impl WorldSnapshot {
    /// Number of creatures.
    pub fn population(&self) -> usize {
        self.energy.len()
    }

    /// Occupancy of one generation.
    pub fn grid(&self, generation: GridGeneration) -> &[i32] {
        match generation {
            GridGeneration::A => &self.grid_a,
            GridGeneration::B => &self.grid_b,
        }
    }

    /// Generation written by the last completed tick.
    pub fn written_generation(&self) -> GridGeneration {
        GridGeneration::written(self.writing_to_a)
    }

    /// Number of non-empty cells in a generation.
    pub fn occupied(&self, generation: GridGeneration) -> usize {
        self.grid(generation).iter().filter(|&&id| id != EMPTY_CELL).count()
    }

    /// Linear index of creature `id`'s cell.
    pub fn cell_of(&self, id: usize) -> usize {
        self.x[id] as usize + self.y[id] as usize * self.width
    }

    /// Weights of creature `id`.
    pub fn agent_weights(&self, id: usize) -> &[f32] {
        let per_agent = self.weights.len() / self.population().max(1);
        &self.weights[id * per_agent..(id + 1) * per_agent]
    }

    /// Reduces the snapshot to summary statistics.
    pub fn stats(&self) -> PopulationStats {
        let creatures = (0..self.population())
            .into_par_iter()
            .fold(CreatureTally::default, |mut acc, id| {
                acc.observe(self.energy[id], self.direction[id]);
                acc
            })
            .reduce(CreatureTally::default, CreatureTally::combine);

        let walls = self.objects.par_iter().filter(|&&o| o == OBJECT_WALL).count();
        let total_food = self.food.par_iter().map(|&f| f as f64).sum();

        PopulationStats {
            tick: self.tick,
            population: self.population(),
            living: creatures.living,
            directions: creatures.directions,
            mean_energy: if creatures.living > 0 {
                creatures.energy / creatures.living as f64
            } else {
                0.0
            },
            walls,
            total_food,
        }
    }
}

/// Thread-local accumulator over creatures.
#[derive(Clone, Copy, Debug, Default)]
struct CreatureTally {
    living: usize,
    directions: [usize; NUM_DIRECTIONS as usize],
    energy: f64,
}

impl CreatureTally {
    fn observe(&mut self, energy: i16, direction: u8) {
        if energy <= 0 {
            return;
        }
        self.living += 1;
        self.energy += energy as f64;
        if let Some(slot) = self.directions.get_mut(direction as usize) {
            *slot += 1;
        }
    }

    fn combine(mut self, other: Self) -> Self {
        self.living += other.living;
        self.energy += other.energy;
        for (a, b) in self.directions.iter_mut().zip(other.directions) {
            *a += b;
        }
        self
    }
}

/// Population summary derived from a [`WorldSnapshot`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PopulationStats {
    /// Tick the snapshot was taken at.
    pub tick: Tick,
    /// Fixed population size, living or not.
    pub population: usize,
    /// Creatures with positive energy.
    pub living: usize,
    /// Living creatures facing north, east, south, west.
    pub directions: [usize; NUM_DIRECTIONS as usize],
    /// Mean energy of living creatures; zero when none are alive.
    pub mean_energy: f64,
    /// Cells holding a wall.
    pub walls: usize,
    /// Sum of food over every cell.
    pub total_food: f64,
}
