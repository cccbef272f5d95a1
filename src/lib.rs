//! # Creature Simulation
//!
//! Device-parallel simulation of a fixed population of neural-network driven
//! creatures on a toroidal grid.
//!
//! ## Design Goals
//! - Lock-free concurrent agent writes through double-buffered occupancy grids
//! - Flat, device-resident layout for a whole population of networks
//! - Fixed-phase tick and render pipelines with explicit barriers
//! - Deterministic initialization from a single seed
//!
//! The kernel program runs either on the host (the built-in reference
//! program, parallel on rayon) or, with feature `gpu`, as WGSL on `wgpu`.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![deny(dead_code)]

pub mod compute;
pub mod engine;
pub mod kernels;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::simulator::Simulator;

pub use engine::config::{
    DynamicsConfig,
    NetworkConfig,
    ProgramSource,
    SimulationConfig,
};

pub use engine::pipeline::{
    ForegroundKernel,
    RenderOutcome,
    RenderRequest,
    TickPhase,
};

pub use engine::snapshot::{
    PopulationStats,
    WorldSnapshot,
};

pub use engine::layout::NetworkTopology;

pub use engine::error::{
    ComputeError,
    ComputeResult,
    ConfigError,
    SimError,
    SimResult,
};

pub use engine::types::{
    Action,
    AgentId,
    Direction,
    GridGeneration,
    Tick,
    EMPTY_CELL,
};

pub use compute::{ComputeContext, DeviceArray};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used simulation types.
///
/// Import with:
/// ```rust
/// use creature_sim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Action,
        Direction,
        ProgramSource,
        RenderRequest,
        SimError,
        SimResult,
        SimulationConfig,
        Simulator,
    };
}
