//! Per-creature arrays.
//!
//! Creature `i` owns element `i` of every array here. The population size is
//! fixed for the lifetime of a simulation: a creature whose energy reaches
//! zero stays in the grids and keeps its id, it just stops acting.

use std::f64::consts::TAU;

use crate::compute::{BufferHandle, ComputeContext, DeviceArray};
use crate::engine::config::DynamicsConfig;
use crate::engine::error::ComputeResult;
use crate::engine::random::SeedStream;
use crate::engine::types::{Action, EMPTY_CELL, NUM_DIRECTIONS};
use crate::engine::world::WorldHost;
use crate::kernels::BufferSlot;

/// Host-side creature contents before allocation.
#[derive(Debug, Clone, Default)]
pub struct PopulationHost {
    /// Cell column of each creature.
    pub x: Vec<i32>,
    /// Cell row of each creature.
    pub y: Vec<i32>,
    /// Starting energy.
    pub energy: Vec<i16>,
    /// Starting hue in radians.
    pub hue: Vec<f32>,
    /// Starting facing direction.
    pub direction: Vec<u8>,
}

impl PopulationHost {
    /// Seeds `count` creatures in id order and stamps each into `world`'s
    /// occupancy.
    ///
    /// Placement rejection-samples uniform cells until an empty one is found,
    /// so `count` must be strictly smaller than the number of cells.
    pub fn seed(
        count: usize,
        dynamics: &DynamicsConfig,
        world: &mut WorldHost,
        rng: &mut SeedStream,
    ) -> Self {
        let mut host = Self {
            x: Vec::with_capacity(count),
            y: Vec::with_capacity(count),
            energy: Vec::with_capacity(count),
            hue: Vec::with_capacity(count),
            direction: Vec::with_capacity(count),
        };

        for id in 0..count {
            let bonus = rng.next_abs_mod(dynamics.energy_variance);
            host.energy.push((dynamics.initial_energy as i32 + bonus as i32) as i16);
            host.hue.push((rng.next_double() * TAU) as f32);
            host.direction.push(rng.next_abs_mod(NUM_DIRECTIONS as u32) as u8);

            loop {
                let x = rng.next_scaled(world.width as u32) as usize;
                let y = rng.next_scaled(world.height as u32) as usize;
                let cell = world.cell(x, y);
                if world.occupancy[cell] == EMPTY_CELL {
                    world.occupancy[cell] = id as i32;
                    host.x.push(x as i32);
                    host.y.push(y as i32);
                    break;
                }
            }
        }
        host
    }

    /// Number of creatures.
    pub fn len(&self) -> usize {
        self.energy.len()
    }

    /// Whether there are no creatures.
    pub fn is_empty(&self) -> bool {
        self.energy.is_empty()
    }
}

/// Device-resident creature buffers.
#[derive(Debug)]
pub struct PopulationState {
    count: usize,
    pub(crate) x: DeviceArray<i32>,
    pub(crate) y: DeviceArray<i32>,
    pub(crate) prev_x: DeviceArray<i32>,
    pub(crate) prev_y: DeviceArray<i32>,
    pub(crate) energy: DeviceArray<i16>,
    pub(crate) hue: DeviceArray<f32>,
    pub(crate) direction: DeviceArray<u8>,
    pub(crate) action: DeviceArray<u8>,
    pub(crate) last_success: DeviceArray<u8>,
    pub(crate) select_x: DeviceArray<i8>,
    pub(crate) select_y: DeviceArray<i8>,
}

impl PopulationState {
    /// Allocates every creature buffer. Previous positions start equal to
    /// positions and last-action-success starts at `1`.
    pub fn allocate(ctx: &mut ComputeContext, host: PopulationHost) -> ComputeResult<Self> {
        let count = host.len();
        Ok(Self {
            count,
            prev_x: DeviceArray::new(ctx, "p_creature_x", host.x.clone())?,
            prev_y: DeviceArray::new(ctx, "p_creature_y", host.y.clone())?,
            x: DeviceArray::new(ctx, "creature_x", host.x)?,
            y: DeviceArray::new(ctx, "creature_y", host.y)?,
            energy: DeviceArray::new(ctx, "creature_energy", host.energy)?,
            hue: DeviceArray::new(ctx, "creature_hue", host.hue)?,
            direction: DeviceArray::new(ctx, "creature_direction", host.direction)?,
            action: DeviceArray::new(ctx, "creature_action", vec![Action::Nothing as u8; count])?,
            last_success: DeviceArray::new(ctx, "last_action_success", vec![1; count])?,
            select_x: DeviceArray::zeroed(ctx, "select_x", count)?,
            select_y: DeviceArray::zeroed(ctx, "select_y", count)?,
        })
    }

    /// Number of creatures.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether there are no creatures.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn handle(&self, slot: BufferSlot) -> Option<BufferHandle> {
        let handle = match slot {
            BufferSlot::CreatureX => self.x.handle(),
            BufferSlot::CreatureY => self.y.handle(),
            BufferSlot::PrevX => self.prev_x.handle(),
            BufferSlot::PrevY => self.prev_y.handle(),
            BufferSlot::Energy => self.energy.handle(),
            BufferSlot::Hue => self.hue.handle(),
            BufferSlot::Direction => self.direction.handle(),
            BufferSlot::Action => self.action.handle(),
            BufferSlot::LastSuccess => self.last_success.handle(),
            BufferSlot::SelectX => self.select_x.handle(),
            BufferSlot::SelectY => self.select_y.handle(),
            _ => return None,
        };
        Some(handle)
    }

    pub(crate) fn download(&mut self, ctx: &mut ComputeContext) -> ComputeResult<()> {
        self.x.download(ctx)?;
        self.y.download(ctx)?;
        self.prev_x.download(ctx)?;
        self.prev_y.download(ctx)?;
        self.energy.download(ctx)?;
        self.hue.download(ctx)?;
        self.direction.download(ctx)?;
        self.action.download(ctx)?;
        self.last_success.download(ctx)?;
        self.select_x.download(ctx)?;
        self.select_y.download(ctx)
    }
}
