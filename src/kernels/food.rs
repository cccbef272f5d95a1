//! Food growth and diffusion kernels, one work item per cell.

use rayon::prelude::*;

use crate::compute::KernelArgs;
use crate::engine::error::ComputeResult;
use crate::engine::random::{unit_f32, xorshift32};
use crate::kernels::{BufferSlot, Bound, ADD_FOOD_SPEC, SPREAD_FOOD_SPEC};

/// Largest growth added to a cell per food phase.
pub const FOOD_GROWTH: f32 = 0.1;

/// Food never grows past this level.
pub const FOOD_CAP: f32 = 1.0;

/// Fraction of the neighbor difference exchanged per spread phase.
pub const DIFFUSION_RATE: f32 = 0.2;

/// Advances each cell's entropy word, grows food by `u^8 * FOOD_GROWTH`, and
/// mirrors the result into the back-buffer.
pub fn add_food(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&ADD_FOOD_SPEC, args);
    let (width, height) = k.world_size()?;
    let mut food = k.write::<f32>(BufferSlot::Food)?;
    let mut back = k.write::<f32>(BufferSlot::FoodBack)?;
    let mut random = k.write::<i32>(BufferSlot::RandomField)?;

    let cells = k.items((width * height).min(food.len()).min(back.len()).min(random.len()))?;

    food[..cells]
        .par_iter_mut()
        .zip(back[..cells].par_iter_mut())
        .zip(random[..cells].par_iter_mut())
        .for_each(|((f, b), r)| {
            let state = xorshift32(*r as u32);
            *r = state as i32;
            *f = (*f + unit_f32(state).powi(8) * FOOD_GROWTH).min(FOOD_CAP);
            *b = *f;
        });
    Ok(())
}

/// Diffuses the back-buffer into the food field over the four torus
/// neighbors. Total food is conserved.
pub fn spread_food(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&SPREAD_FOOD_SPEC, args);
    let (width, height) = k.world_size()?;
    let mut food = k.write::<f32>(BufferSlot::Food)?;
    let back = k.read::<f32>(BufferSlot::FoodBack)?;

    if back.len() < width * height {
        return Err(k.fault("back-buffer is smaller than the world"));
    }
    let cells = k.items((width * height).min(food.len()))?;
    let back: &[f32] = &back;

    food[..cells].par_iter_mut().enumerate().for_each(|(c, f)| {
        let (x, y) = (c % width, c / width);
        let left = back[(x + width - 1) % width + y * width];
        let right = back[(x + 1) % width + y * width];
        let up = back[x + ((y + height - 1) % height) * width];
        let down = back[x + ((y + 1) % height) * width];
        let mean = (left + right + up + down) * 0.25;
        *f = back[c] + DIFFUSION_RATE * (mean - back[c]);
    });
    Ok(())
}
