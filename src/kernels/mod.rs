//! # Kernel Contract
//!
//! One static table names every kernel of the simulation program together with
//! the ordered buffers it consumes. It is the single source of truth for
//! argument layout:
//!
//! * the simulator walks it to bind each buffer to its argument slot, and
//! * the reference host kernels resolve their arguments through it,
//!
//! so a WGSL program written against the same table sees identical bindings.
//!
//! ## Reference program
//!
//! [`reference_program`] returns host implementations of every kernel.
//! Kernels whose writes are disjoint per work item (perception, rendering,
//! food, weight broadcast) run on rayon. Kernels that scatter into shared grids
//! (cleanup, action) run sequentially in agent id order, which makes the
//! outcome of contested moves deterministic.

use std::cell::{Ref, RefMut};

use bytemuck::Pod;

use crate::compute::{HostProgram, KernelArgs};
use crate::engine::error::{ComputeError, ComputeResult};
use crate::engine::types::GridGeneration;

pub mod brain;
pub mod food;
pub mod grid;
pub mod render;

/// Perception and decision.
pub const UPDATE_CREATURE: &str = "updateCreatureKernel";
/// Action resolution.
pub const ACTION: &str = "actionKernel";
/// Stale-grid cleanup.
pub const ACTION_CLEANUP: &str = "actionCleanupKernel";
/// One-pixel creature plot.
pub const RENDER_FOREGROUND_SIMPLE: &str = "renderForegroundSimpleKernel";
/// Interpolated creature bodies.
pub const RENDER_FOREGROUND_DETAILED: &str = "renderForegroundDetailedKernel";
/// Food and wall layer.
pub const RENDER_BACKGROUND: &str = "renderBackgroundKernel";
/// Random food growth.
pub const ADD_FOOD: &str = "addFoodKernel";
/// Food diffusion.
pub const SPREAD_FOOD: &str = "spreadFoodKernel";
/// Grid generation swap.
pub const FLIP_WRITING_TO_A: &str = "flipWritingToAKernel";
/// Camera follow.
pub const SPECTATE_CREATURE: &str = "spectateCreatureKernel";
/// Weight broadcast.
pub const COPY_SPECTATING_TO_ALL: &str = "copySpectatingToAll";

/// Every simulation buffer that can appear in a kernel argument list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferSlot {
    /// `i32[2]`: width, height.
    WorldSize,
    /// `i32[1]`: nonzero while grid A is the one being written.
    WritingToA,
    /// `i32[cells]`: occupancy generation A.
    GridA,
    /// `i32[cells]`: occupancy generation B.
    GridB,
    /// `u8[cells]`: object per cell.
    Objects,
    /// `f32[cells]`: food per cell.
    Food,
    /// `f32[cells]`: diffusion back-buffer.
    FoodBack,
    /// `i32[cells]`: per-cell entropy words.
    RandomField,
    /// `i32[n]`
    CreatureX,
    /// `i32[n]`
    CreatureY,
    /// `i32[n]`: x before the last action.
    PrevX,
    /// `i32[n]`: y before the last action.
    PrevY,
    /// `i16[n]`
    Energy,
    /// `f32[n]`: radians.
    Hue,
    /// `u8[n]`
    Direction,
    /// `u8[n]`
    Action,
    /// `u8[n]`
    LastSuccess,
    /// `i8[n]`: x offset of the last targeted cell.
    SelectX,
    /// `i8[n]`: y offset of the last targeted cell.
    SelectY,
    /// `i32[2]`: vision window width, height.
    VisionSize,
    /// `i32[layers]`
    LayerSizes,
    /// `i32[1]`
    LayerCount,
    /// `i32[layers]`
    WeightOffsets,
    /// `i32[layers]`
    NeuronOffsets,
    /// `i32[1]`
    WeightsPerAgent,
    /// `i32[1]`
    NeuronsPerAgent,
    /// `f32[n * weights_per_agent]`
    Weights,
    /// `f32[n * neurons_per_agent]`
    NeuronOutputs,
    /// `f32[6]`: screen w, screen h, center x, center y, zoom, progress.
    ViewParams,
    /// `u32[screen w * screen h]`: `0xAARRGGBB` pixels.
    Framebuffer,
    /// `i32[1]`: agent id used by spectate and broadcast.
    SpectateTarget,
}

impl BufferSlot {
    /// Occupancy slot of a grid generation.
    #[inline]
    pub fn grid(generation: GridGeneration) -> Self {
        match generation {
            GridGeneration::A => BufferSlot::GridA,
            GridGeneration::B => BufferSlot::GridB,
        }
    }
}

/// Name and ordered argument list of one kernel.
#[derive(Debug)]
pub struct KernelSpec {
    /// Entry point name.
    pub name: &'static str,
    /// Buffers in argument order.
    pub args: &'static [BufferSlot],
}

impl KernelSpec {
    /// Argument index of `slot`, if the kernel takes it.
    pub fn position(&self, slot: BufferSlot) -> Option<usize> {
        self.args.iter().position(|&s| s == slot)
    }
}

use BufferSlot::*;

/// Contract of [`ACTION_CLEANUP`]. Current positions follow the six base
/// arguments so the stale grid can be restamped.
pub static ACTION_CLEANUP_SPEC: KernelSpec = KernelSpec {
    name: ACTION_CLEANUP,
    args: &[WorldSize, WritingToA, GridA, GridB, PrevX, PrevY, CreatureX, CreatureY],
};

/// Contract of [`FLIP_WRITING_TO_A`].
pub static FLIP_WRITING_TO_A_SPEC: KernelSpec = KernelSpec {
    name: FLIP_WRITING_TO_A,
    args: &[WritingToA],
};

/// Contract of [`UPDATE_CREATURE`].
pub static UPDATE_CREATURE_SPEC: KernelSpec = KernelSpec {
    name: UPDATE_CREATURE,
    args: &[
        WorldSize, WritingToA, GridA, GridB, SelectX, SelectY, LastSuccess, RandomField,
        CreatureX, CreatureY, Energy, Food, Action, Direction, VisionSize, Hue, Objects,
        NeuronOutputs, NeuronsPerAgent, WeightsPerAgent, LayerSizes, LayerCount, WeightOffsets,
        NeuronOffsets, Weights,
    ],
};

/// Contract of [`ACTION`]. Food is the last argument, read by eating.
pub static ACTION_SPEC: KernelSpec = KernelSpec {
    name: ACTION,
    args: &[
        WorldSize, WritingToA, GridA, GridB, SelectX, SelectY, CreatureX, CreatureY, PrevX, PrevY,
        LastSuccess, Energy, Action, Objects, RandomField, WeightsPerAgent, Weights,
        NeuronsPerAgent, NeuronOutputs, Direction, Food,
    ],
};

/// Contract of [`ADD_FOOD`].
pub static ADD_FOOD_SPEC: KernelSpec = KernelSpec {
    name: ADD_FOOD,
    args: &[WorldSize, Food, FoodBack, RandomField],
};

/// Contract of [`SPREAD_FOOD`].
pub static SPREAD_FOOD_SPEC: KernelSpec = KernelSpec {
    name: SPREAD_FOOD,
    args: &[WorldSize, Food, FoodBack, RandomField],
};

/// Contract of [`RENDER_BACKGROUND`].
pub static RENDER_BACKGROUND_SPEC: KernelSpec = KernelSpec {
    name: RENDER_BACKGROUND,
    args: &[WorldSize, ViewParams, Food, Objects, Framebuffer],
};

const FOREGROUND_ARGS: &[BufferSlot] = &[
    WorldSize, WritingToA, GridA, GridB, CreatureX, CreatureY, PrevX, PrevY, ViewParams,
    Framebuffer, SelectX, SelectY, Hue, Energy,
];

/// Contract of [`RENDER_FOREGROUND_SIMPLE`].
pub static RENDER_FOREGROUND_SIMPLE_SPEC: KernelSpec = KernelSpec {
    name: RENDER_FOREGROUND_SIMPLE,
    args: FOREGROUND_ARGS,
};

/// Contract of [`RENDER_FOREGROUND_DETAILED`].
pub static RENDER_FOREGROUND_DETAILED_SPEC: KernelSpec = KernelSpec {
    name: RENDER_FOREGROUND_DETAILED,
    args: FOREGROUND_ARGS,
};

/// Contract of [`SPECTATE_CREATURE`].
pub static SPECTATE_CREATURE_SPEC: KernelSpec = KernelSpec {
    name: SPECTATE_CREATURE,
    args: &[WorldSize, CreatureX, CreatureY, PrevX, PrevY, SpectateTarget, ViewParams],
};

/// Contract of [`COPY_SPECTATING_TO_ALL`]. The weight buffers follow the
/// target id.
pub static COPY_SPECTATING_TO_ALL_SPEC: KernelSpec = KernelSpec {
    name: COPY_SPECTATING_TO_ALL,
    args: &[SpectateTarget, WeightsPerAgent, Weights],
};

/// Every kernel of the simulation program, in registration order.
pub static KERNELS: [&KernelSpec; 11] = [
    &ACTION_SPEC,
    &ACTION_CLEANUP_SPEC,
    &RENDER_FOREGROUND_SIMPLE_SPEC,
    &RENDER_FOREGROUND_DETAILED_SPEC,
    &UPDATE_CREATURE_SPEC,
    &ADD_FOOD_SPEC,
    &SPREAD_FOOD_SPEC,
    &FLIP_WRITING_TO_A_SPEC,
    &RENDER_BACKGROUND_SPEC,
    &SPECTATE_CREATURE_SPEC,
    &COPY_SPECTATING_TO_ALL_SPEC,
];

/// Names of every kernel, in registration order.
pub fn kernel_names() -> Vec<&'static str> {
    KERNELS.iter().map(|spec| spec.name).collect()
}

/// Host implementation of the whole kernel program.
pub fn reference_program() -> HostProgram {
    HostProgram::new("reference")
        .with_kernel(ACTION_CLEANUP, grid::action_cleanup)
        .with_kernel(FLIP_WRITING_TO_A, grid::flip_writing_to_a)
        .with_kernel(ACTION, grid::action)
        .with_kernel(UPDATE_CREATURE, brain::update_creature)
        .with_kernel(COPY_SPECTATING_TO_ALL, brain::copy_spectating_to_all)
        .with_kernel(ADD_FOOD, food::add_food)
        .with_kernel(SPREAD_FOOD, food::spread_food)
        .with_kernel(RENDER_BACKGROUND, render::background)
        .with_kernel(RENDER_FOREGROUND_SIMPLE, render::foreground_simple)
        .with_kernel(RENDER_FOREGROUND_DETAILED, render::foreground_detailed)
        .with_kernel(SPECTATE_CREATURE, render::spectate_creature)
}

/// Kernel arguments addressed by [`BufferSlot`] instead of raw index.
pub(crate) struct Bound<'k, 'a> {
    spec: &'static KernelSpec,
    args: &'k KernelArgs<'a>,
}

impl<'k, 'a> Bound<'k, 'a> {
    pub(crate) fn new(spec: &'static KernelSpec, args: &'k KernelArgs<'a>) -> Self {
        Self { spec, args }
    }

    #[inline]
    pub(crate) fn work_size(&self) -> usize {
        self.args.work_size()
    }

    /// Number of work items, checked against the length of the buffer they
    /// index.
    pub(crate) fn items(&self, len: usize) -> ComputeResult<usize> {
        let n = self.work_size();
        if n > len {
            return Err(self.fault(format!("work size {n} exceeds buffer length {len}")));
        }
        Ok(n)
    }

    pub(crate) fn read<T: Pod>(&self, slot: BufferSlot) -> ComputeResult<Ref<'a, [T]>> {
        self.args.read(self.index(slot)?)
    }

    pub(crate) fn write<T: Pod>(&self, slot: BufferSlot) -> ComputeResult<RefMut<'a, [T]>> {
        self.args.write(self.index(slot)?)
    }

    /// First element of a one- or two-element scalar buffer.
    pub(crate) fn scalar(&self, slot: BufferSlot) -> ComputeResult<i32> {
        let values = self.read::<i32>(slot)?;
        values
            .first()
            .copied()
            .ok_or_else(|| self.fault(format!("{slot:?} is empty")))
    }

    /// `(width, height)` of the world.
    pub(crate) fn world_size(&self) -> ComputeResult<(usize, usize)> {
        let size = self.read::<i32>(WorldSize)?;
        match *size {
            [w, h, ..] if w > 0 && h > 0 => Ok((w as usize, h as usize)),
            _ => Err(self.fault("world size must hold two positive values")),
        }
    }

    /// Generation currently being written, per the shared flag.
    pub(crate) fn written_generation(&self) -> ComputeResult<GridGeneration> {
        Ok(GridGeneration::written(self.scalar(WritingToA)?))
    }

    pub(crate) fn fault(&self, message: impl Into<String>) -> ComputeError {
        self.args.fault(message)
    }

    fn index(&self, slot: BufferSlot) -> ComputeResult<usize> {
        self.spec.position(slot).ok_or_else(|| ComputeError::ArgumentMismatch {
            kernel: self.spec.name.to_owned(),
            arg: self.spec.args.len() as u32,
            detail: format!("kernel does not take {slot:?}"),
        })
    }
}

/// Index of the cell `(x, y)` after wrapping both coordinates onto the torus.
#[inline]
pub(crate) fn cell_index(x: i32, y: i32, width: usize, height: usize) -> usize {
    let x = x.rem_euclid(width as i32) as usize;
    let y = y.rem_euclid(height as i32) as usize;
    x + y * width
}
