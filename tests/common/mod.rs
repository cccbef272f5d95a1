#![allow(dead_code)]

use std::collections::HashSet;

use creature_sim::{
    GridGeneration, ProgramSource, SimResult, SimulationConfig, Simulator, WorldSnapshot,
    EMPTY_CELL,
};

pub const WIDTH: u32 = 16;
pub const HEIGHT: u32 = 16;
pub const CREATURES: u32 = 8;
pub const SEED: u64 = 42;

pub const SCREEN_W: u32 = 32;
pub const SCREEN_H: u32 = 24;

/// 16x16 world with 8 creatures and a small framebuffer.
pub fn small_config(seed: u64) -> SimulationConfig {
    SimulationConfig::new(WIDTH, HEIGHT, CREATURES, ProgramSource::Reference, seed)
        .with_framebuffer(SCREEN_W, SCREEN_H)
}

pub fn small_sim(seed: u64) -> SimResult<Simulator> {
    Simulator::new(small_config(seed))
}

/// Ids stored in one occupancy generation, checked for duplicates.
pub fn occupants(snapshot: &WorldSnapshot, generation: GridGeneration) -> HashSet<i32> {
    let grid = snapshot.grid(generation);
    let mut ids = HashSet::new();
    for &id in grid.iter().filter(|&&id| id != EMPTY_CELL) {
        assert!(ids.insert(id), "agent {id} appears twice in grid {generation:?}");
    }
    ids
}

/// Both generations hold every agent exactly once, the written generation at
/// the current positions and the other at the previous positions.
pub fn assert_grid_invariants(snapshot: &WorldSnapshot) {
    let n = snapshot.population();
    let expected: HashSet<i32> = (0..n as i32).collect();

    for generation in [GridGeneration::A, GridGeneration::B] {
        assert_eq!(snapshot.occupied(generation), n, "grid {generation:?}");
        assert_eq!(occupants(snapshot, generation), expected, "grid {generation:?}");
    }

    let written = snapshot.grid(snapshot.written_generation());
    let stale = snapshot.grid(snapshot.written_generation().other());
    for id in 0..n {
        assert_eq!(written[snapshot.cell_of(id)], id as i32, "agent {id} current cell");
        let prev = snapshot.prev_x[id] as usize + snapshot.prev_y[id] as usize * snapshot.width;
        assert_eq!(stale[prev], id as i32, "agent {id} previous cell");
    }
}

/// Positions, directions and the flag are within their domains.
pub fn assert_ranges(snapshot: &WorldSnapshot) {
    assert!(snapshot.writing_to_a == 0 || snapshot.writing_to_a == 1);
    for id in 0..snapshot.population() {
        assert!((0..snapshot.width as i32).contains(&snapshot.x[id]));
        assert!((0..snapshot.height as i32).contains(&snapshot.y[id]));
        assert!(snapshot.direction[id] < 4, "agent {id} direction");
        assert!(snapshot.action[id] < 7, "agent {id} action");
    }
    assert!(snapshot.food.iter().all(|&f| f.is_finite() && f >= 0.0));
}
