#![allow(dead_code)]

use creature_sim::{ProgramSource, SimulationConfig, Simulator};

pub const SEED: u64 = 42;

/// World sizes benchmarked, `(width, height)`.
pub const WORLDS: [(u32, u32); 3] = [(64, 36), (160, 90), (320, 180)];

/// One creature per 32 cells.
pub fn config(width: u32, height: u32) -> SimulationConfig {
    SimulationConfig::new(width, height, width * height / 32 + 1, ProgramSource::Reference, SEED)
        .with_framebuffer(320, 180)
}

pub fn make_sim(width: u32, height: u32) -> Simulator {
    Simulator::new(config(width, height)).unwrap()
}
