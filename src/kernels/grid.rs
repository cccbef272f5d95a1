//! Occupancy kernels: cleanup, flip, and action resolution.
//!
//! These kernels scatter into shared grids, so the host versions run in agent
//! id order. Contested moves are won by the lowest id.

use crate::compute::KernelArgs;
use crate::engine::error::ComputeResult;
use crate::engine::random::{unit_f32, xorshift32};
use crate::engine::types::{Action, Direction, EMPTY_CELL, OBJECT_NONE, OBJECT_WALL};
use crate::kernels::{
    cell_index, BufferSlot, Bound, ACTION_CLEANUP_SPEC, ACTION_SPEC, FLIP_WRITING_TO_A_SPEC,
};

/// Energy every living agent spends per tick.
pub const TICK_ENERGY_COST: i16 = 1;

/// Energy gained per unit of food eaten.
pub const FOOD_ENERGY: f32 = 1000.0;

/// Energy drained from the target of a damage action.
pub const DAMAGE_AMOUNT: i16 = 60;

/// Energy the attacker gains from a successful damage action.
pub const DAMAGE_GAIN: i16 = 30;

/// Extra cost of placing a wall.
pub const WALL_COST: i16 = 4;

/// Extra cost of copying a network onto another agent.
pub const COPY_COST: i16 = 40;

/// Per-weight probability of a mutation during copy.
pub const MUTATION_RATE: f32 = 0.02;

/// Largest magnitude of a single weight mutation.
pub const MUTATION_SCALE: f32 = 0.2;

/// Reconciles the grid that is not currently written with the latest
/// positions: each agent clears its previous cell (if it still holds it) and
/// stamps its current cell.
pub fn action_cleanup(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&ACTION_CLEANUP_SPEC, args);
    let (width, height) = k.world_size()?;
    let stale = k.written_generation()?.other();

    let mut grid = k.write::<i32>(BufferSlot::grid(stale))?;
    let x = k.read::<i32>(BufferSlot::CreatureX)?;
    let y = k.read::<i32>(BufferSlot::CreatureY)?;
    let px = k.read::<i32>(BufferSlot::PrevX)?;
    let py = k.read::<i32>(BufferSlot::PrevY)?;
    let n = k.items(x.len().min(y.len()).min(px.len()).min(py.len()))?;

    for id in 0..n {
        let from = cell_index(px[id], py[id], width, height);
        if grid[from] == id as i32 {
            grid[from] = EMPTY_CELL;
        }
        grid[cell_index(x[id], y[id], width, height)] = id as i32;
    }
    Ok(())
}

/// Toggles `writing_to_a`.
pub fn flip_writing_to_a(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&FLIP_WRITING_TO_A_SPEC, args);
    let mut flag = k.write::<i32>(BufferSlot::WritingToA)?;
    match flag.first_mut() {
        Some(value) => {
            *value = if *value != 0 { 0 } else { 1 };
            Ok(())
        }
        None => Err(k.fault("flag buffer is empty")),
    }
}

/// Applies every agent's pending action.
///
/// Reads occupancy from the read generation and writes the write generation.
/// A move succeeds only when the target is empty in the read grid, unclaimed in
/// the write grid, and holds no wall.
pub fn action(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&ACTION_SPEC, args);
    let (width, height) = k.world_size()?;
    let written = k.written_generation()?;
    let weights_per_agent = k.scalar(BufferSlot::WeightsPerAgent)? as usize;
    let neurons_per_agent = k.scalar(BufferSlot::NeuronsPerAgent)? as usize;

    let read_grid = k.read::<i32>(BufferSlot::grid(written.other()))?;
    let mut write_grid = k.write::<i32>(BufferSlot::grid(written))?;
    let mut select_x = k.write::<i8>(BufferSlot::SelectX)?;
    let mut select_y = k.write::<i8>(BufferSlot::SelectY)?;
    let mut x = k.write::<i32>(BufferSlot::CreatureX)?;
    let mut y = k.write::<i32>(BufferSlot::CreatureY)?;
    let mut px = k.write::<i32>(BufferSlot::PrevX)?;
    let mut py = k.write::<i32>(BufferSlot::PrevY)?;
    let mut success = k.write::<u8>(BufferSlot::LastSuccess)?;
    let mut energy = k.write::<i16>(BufferSlot::Energy)?;
    let actions = k.read::<u8>(BufferSlot::Action)?;
    let mut objects = k.write::<u8>(BufferSlot::Objects)?;
    let mut random = k.write::<i32>(BufferSlot::RandomField)?;
    let mut weights = k.write::<f32>(BufferSlot::Weights)?;
    let mut outputs = k.write::<f32>(BufferSlot::NeuronOutputs)?;
    let directions = k.read::<u8>(BufferSlot::Direction)?;
    let mut food = k.write::<f32>(BufferSlot::Food)?;

    let n = k.items(energy.len())?;
    if weights.len() < n * weights_per_agent || outputs.len() < n * neurons_per_agent {
        return Err(k.fault("network buffers are shorter than the population"));
    }

    for id in 0..n {
        px[id] = x[id];
        py[id] = y[id];
        select_x[id] = 0;
        select_y[id] = 0;

        if energy[id] <= 0 {
            success[id] = 0;
            continue;
        }
        energy[id] = energy[id].saturating_sub(TICK_ENERGY_COST);

        let action = Action::try_from(actions[id])
            .map_err(|raw| k.fault(format!("agent {id} holds invalid action {raw}")))?;
        let direction = Direction::try_from(directions[id])
            .map_err(|raw| k.fault(format!("agent {id} holds invalid direction {raw}")))?;

        let here = cell_index(x[id], y[id], width, height);
        let (dx, dy) = direction.offset();
        let front = cell_index(x[id] + dx, y[id] + dy, width, height);
        if matches!(
            action,
            Action::Move | Action::PlaceWall | Action::Damage | Action::Copy
        ) {
            select_x[id] = dx as i8;
            select_y[id] = dy as i8;
        }

        let ok = match action {
            Action::Nothing | Action::Rotate => true,
            Action::Move => {
                let open = read_grid[front] == EMPTY_CELL
                    && write_grid[front] == EMPTY_CELL
                    && objects[front] != OBJECT_WALL;
                if open {
                    write_grid[front] = id as i32;
                    write_grid[here] = EMPTY_CELL;
                    x[id] = (x[id] + dx).rem_euclid(width as i32);
                    y[id] = (y[id] + dy).rem_euclid(height as i32);
                }
                open
            }
            Action::Eat => {
                let gain = (food[here] * FOOD_ENERGY) as i32;
                food[here] = 0.0;
                energy[id] = (energy[id] as i32 + gain).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                gain > 0
            }
            Action::PlaceWall => {
                let open = read_grid[front] == EMPTY_CELL
                    && write_grid[front] == EMPTY_CELL
                    && objects[front] == OBJECT_NONE;
                if open {
                    objects[front] = OBJECT_WALL;
                    energy[id] = energy[id].saturating_sub(WALL_COST);
                }
                open
            }
            Action::Damage => match living_target(read_grid[front], id, &energy) {
                Some(target) => {
                    energy[target] = energy[target].saturating_sub(DAMAGE_AMOUNT);
                    energy[id] = energy[id].saturating_add(DAMAGE_GAIN);
                    true
                }
                None if objects[front] == OBJECT_WALL => {
                    objects[front] = OBJECT_NONE;
                    true
                }
                None => false,
            },
            Action::Copy => match living_target(read_grid[front], id, &energy) {
                Some(target) => {
                    let mut state = random[here] as u32;
                    let src = id * weights_per_agent;
                    let dst = target * weights_per_agent;
                    for w in 0..weights_per_agent {
                        let mut value = weights[src + w];
                        state = xorshift32(state);
                        if unit_f32(state) < MUTATION_RATE {
                            state = xorshift32(state);
                            value += (unit_f32(state) * 2.0 - 1.0) * MUTATION_SCALE;
                        }
                        weights[dst + w] = value;
                    }
                    random[here] = state as i32;
                    outputs[target * neurons_per_agent..(target + 1) * neurons_per_agent].fill(0.0);
                    energy[id] = energy[id].saturating_sub(COPY_COST);
                    true
                }
                None => false,
            },
        };
        success[id] = ok as u8;
    }
    Ok(())
}

/// Id of a living agent other than `actor` stored in an occupancy cell.
fn living_target(occupant: i32, actor: usize, energy: &[i16]) -> Option<usize> {
    let target = usize::try_from(occupant).ok()?;
    (target != actor && energy.get(target).is_some_and(|&e| e > 0)).then_some(target)
}
