//! Grid-shaped simulation state.
//!
//! ## Occupancy double buffer
//!
//! Two occupancy grids hold the same population in two generations. The
//! single device flag `writing_to_a` names the generation ACT writes; the
//! other one is read. CLEANUP brings the stale generation up to date before
//! FLIP swaps the roles, so after every tick both grids hold every creature
//! exactly once.
//!
//! ## Seeding
//!
//! [`WorldHost::seed`] fills the host vectors cell by cell, drawing the
//! entropy word before the food level of each cell. Creatures are placed
//! afterwards by [`crate::engine::population::PopulationHost::seed`].

use crate::compute::{BufferHandle, ComputeContext, DeviceArray};
use crate::engine::error::ComputeResult;
use crate::engine::random::SeedStream;
use crate::engine::types::{GridGeneration, EMPTY_CELL, OBJECT_NONE};
use crate::kernels::BufferSlot;

/// Base food level of every cell at seeding.
pub const INITIAL_FOOD_BASE: f32 = 0.01;

/// Scale of the skewed random food added at seeding.
pub const INITIAL_FOOD_SCALE: f32 = 0.1;

/// Host-side world contents before allocation.
#[derive(Debug, Clone)]
pub struct WorldHost {
    /// Width in cells.
    pub width: usize,
    /// Height in cells.
    pub height: usize,
    /// Occupancy, copied into both generations on allocation.
    pub occupancy: Vec<i32>,
    /// Per-cell entropy words.
    pub random: Vec<i32>,
    /// Food per cell.
    pub food: Vec<f32>,
}

impl WorldHost {
    /// Empty grid, random entropy, and `0.01 + u^8 * 0.1` food per cell.
    pub fn seed(width: usize, height: usize, rng: &mut SeedStream) -> Self {
        let cells = width * height;
        let mut random = Vec::with_capacity(cells);
        let mut food = Vec::with_capacity(cells);
        for _ in 0..cells {
            random.push(rng.next_int());
            food.push(INITIAL_FOOD_BASE + rng.next_float().powi(8) * INITIAL_FOOD_SCALE);
        }
        Self {
            width,
            height,
            occupancy: vec![EMPTY_CELL; cells],
            random,
            food,
        }
    }

    /// Linear index of `(x, y)`.
    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> usize {
        x + y * self.width
    }
}

/// Device-resident world buffers.
#[derive(Debug)]
pub struct WorldState {
    width: usize,
    height: usize,
    pub(crate) size: DeviceArray<i32>,
    pub(crate) writing_to_a: DeviceArray<i32>,
    pub(crate) grid_a: DeviceArray<i32>,
    pub(crate) grid_b: DeviceArray<i32>,
    pub(crate) objects: DeviceArray<u8>,
    pub(crate) food: DeviceArray<f32>,
    pub(crate) food_back: DeviceArray<f32>,
    pub(crate) random: DeviceArray<i32>,
}

impl WorldState {
    /// Allocates every world buffer from `host`. Both occupancy generations
    /// start identical; the flag starts at `0`, so the first FLIP makes grid A
    /// the written generation.
    pub fn allocate(ctx: &mut ComputeContext, host: WorldHost) -> ComputeResult<Self> {
        let cells = host.width * host.height;
        Ok(Self {
            width: host.width,
            height: host.height,
            size: DeviceArray::new(ctx, "world_size", vec![host.width as i32, host.height as i32])?,
            writing_to_a: DeviceArray::new(ctx, "writing_to_a", vec![0])?,
            grid_a: DeviceArray::new(ctx, "world_a", host.occupancy.clone())?,
            grid_b: DeviceArray::new(ctx, "world_b", host.occupancy)?,
            objects: DeviceArray::new(ctx, "world_objects", vec![OBJECT_NONE; cells])?,
            food_back: DeviceArray::new(ctx, "world_food_back", host.food.clone())?,
            food: DeviceArray::new(ctx, "world_food", host.food)?,
            random: DeviceArray::new(ctx, "random_numbers", host.random)?,
        })
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells.
    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    /// Occupancy array of one generation.
    pub fn grid(&self, generation: GridGeneration) -> &DeviceArray<i32> {
        match generation {
            GridGeneration::A => &self.grid_a,
            GridGeneration::B => &self.grid_b,
        }
    }

    /// Device handle backing `slot`, if the world owns it.
    pub(crate) fn handle(&self, slot: BufferSlot) -> Option<BufferHandle> {
        let handle = match slot {
            BufferSlot::WorldSize => self.size.handle(),
            BufferSlot::WritingToA => self.writing_to_a.handle(),
            BufferSlot::GridA => self.grid_a.handle(),
            BufferSlot::GridB => self.grid_b.handle(),
            BufferSlot::Objects => self.objects.handle(),
            BufferSlot::Food => self.food.handle(),
            BufferSlot::FoodBack => self.food_back.handle(),
            BufferSlot::RandomField => self.random.handle(),
            _ => return None,
        };
        Some(handle)
    }

    /// Refreshes every host mirror from the device.
    pub(crate) fn download(&mut self, ctx: &mut ComputeContext) -> ComputeResult<()> {
        self.writing_to_a.download(ctx)?;
        self.grid_a.download(ctx)?;
        self.grid_b.download(ctx)?;
        self.objects.download(ctx)?;
        self.food.download(ctx)?;
        self.food_back.download(ctx)?;
        self.random.download(ctx)
    }
}
