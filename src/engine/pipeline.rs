//! Phase ordering of the tick and render pipelines.
//!
//! A tick is a fixed sequence of phases. Each phase is exactly one kernel
//! dispatch followed by a full barrier, so every phase observes all writes of
//! the phases before it:
//!
//! ```text
//! CLEANUP -> FLIP -> PERCEIVE_DECIDE -> ACT [-> FOOD_ADD -> FOOD_SPREAD]
//! ```
//!
//! The food phases only run on ticks where the food period has elapsed. FLIP
//! is the only point where agents coordinate: it swaps which occupancy
//! generation is read and which is written.

use crate::engine::types::{AgentId, Tick};
use crate::kernels::{
    ACTION, ACTION_CLEANUP, ADD_FOOD, FLIP_WRITING_TO_A, RENDER_FOREGROUND_DETAILED,
    RENDER_FOREGROUND_SIMPLE, SPREAD_FOOD, UPDATE_CREATURE,
};

/// One phase of the tick pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickPhase {
    /// Reconcile the generation that is not currently written.
    Cleanup,
    /// Toggle `writing_to_a`.
    Flip,
    /// Perception, forward pass, pending action.
    PerceiveDecide,
    /// Apply pending actions.
    Act,
    /// Random food growth.
    FoodAdd,
    /// Food diffusion.
    FoodSpread,
}

/// How many work items a phase is dispatched over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkSize {
    /// One item.
    Single,
    /// One item per creature.
    Population,
    /// One item per cell.
    Cells,
}

impl TickPhase {
    /// Phases that run on every tick, in order.
    pub const ALWAYS: [TickPhase; 4] = [
        TickPhase::Cleanup,
        TickPhase::Flip,
        TickPhase::PerceiveDecide,
        TickPhase::Act,
    ];

    /// Phases that run when food is due, in order.
    pub const FOOD: [TickPhase; 2] = [TickPhase::FoodAdd, TickPhase::FoodSpread];

    /// Kernel dispatched by this phase.
    pub fn kernel(self) -> &'static str {
        match self {
            TickPhase::Cleanup => ACTION_CLEANUP,
            TickPhase::Flip => FLIP_WRITING_TO_A,
            TickPhase::PerceiveDecide => UPDATE_CREATURE,
            TickPhase::Act => ACTION,
            TickPhase::FoodAdd => ADD_FOOD,
            TickPhase::FoodSpread => SPREAD_FOOD,
        }
    }

    /// Work size class of this phase.
    pub fn work_size(self) -> WorkSize {
        match self {
            TickPhase::Flip => WorkSize::Single,
            TickPhase::Cleanup | TickPhase::PerceiveDecide | TickPhase::Act => {
                WorkSize::Population
            }
            TickPhase::FoodAdd | TickPhase::FoodSpread => WorkSize::Cells,
        }
    }
}

/// Whether the food phases run on `tick` (the counter value before it
/// increments). Tick zero never runs them.
#[inline]
pub fn food_due(tick: Tick, period: u64) -> bool {
    tick != 0 && period != 0 && tick % period == 0
}

/// Ordered phases of the tick numbered `tick`.
pub fn phases_for_tick(tick: Tick, food_period: u64) -> Vec<TickPhase> {
    let mut phases = TickPhase::ALWAYS.to_vec();
    if food_due(tick, food_period) {
        phases.extend_from_slice(&TickPhase::FOOD);
    }
    phases
}

/// Foreground variant drawn over the background.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForegroundKernel {
    /// One flat color per covered cell.
    Simple,
    /// Interpolated bodies with outlines and selection highlights.
    Detailed,
}

impl ForegroundKernel {
    /// Detailed strictly above `threshold`, simple otherwise.
    pub fn for_zoom(zoom: f32, threshold: f32) -> Self {
        if zoom > threshold { ForegroundKernel::Detailed } else { ForegroundKernel::Simple }
    }

    /// Kernel name.
    pub fn kernel(self) -> &'static str {
        match self {
            ForegroundKernel::Simple => RENDER_FOREGROUND_SIMPLE,
            ForegroundKernel::Detailed => RENDER_FOREGROUND_DETAILED,
        }
    }
}

/// Camera input of one render call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderRequest {
    /// Camera center x in world cells.
    pub center_x: f32,
    /// Camera center y in world cells.
    pub center_y: f32,
    /// Screen pixels per cell; at least `1`.
    pub zoom: f32,
    /// Fraction of the current tick elapsed, in `[0, 1]`.
    pub progress: f32,
    /// Creature the camera follows, if any.
    pub spectate: Option<AgentId>,
}

impl RenderRequest {
    /// Fixed camera at `(center_x, center_y)`, no interpolation.
    pub fn at(center_x: f32, center_y: f32, zoom: f32) -> Self {
        Self { center_x, center_y, zoom, progress: 0.0, spectate: None }
    }

    /// Sets the interpolation progress.
    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = progress;
        self
    }

    /// Follows creature `id`.
    pub fn spectating(mut self, id: AgentId) -> Self {
        self.spectate = Some(id);
        self
    }
}

/// Result of one render call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderOutcome {
    /// Camera center actually used; moved onto the spectated creature when
    /// following one.
    pub center: (f32, f32),
    /// Foreground variant that was drawn.
    pub foreground: ForegroundKernel,
}
