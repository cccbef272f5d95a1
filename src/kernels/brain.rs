//! Perception, decision, and network broadcast kernels.
//!
//! ## Perception
//!
//! Each agent sees a `vision_w × vision_h` window of cells laid out in its own
//! frame: rows run from the farthest cell ahead to the farthest cell behind,
//! columns from left to right. Every cell contributes an RGB triple:
//!
//! * an agent: its hue color (gray when inactive),
//! * a wall: mid gray,
//! * otherwise: green scaled by the food level.
//!
//! The input vector ends with the last-action-success flag and the food under
//! the agent.
//!
//! ## Decision
//!
//! Layer `0` of the neuron-output vector holds the inputs. Every later neuron
//! computes `tanh(Σ w·in + bias + w_self · previous_output)`. The final layer
//! yields seven action logits, a turn bias, and the two hue components.

use std::f32::consts::TAU;

use rayon::prelude::*;

use crate::compute::KernelArgs;
use crate::engine::error::{ComputeError, ComputeResult};
use crate::engine::types::{Action, Direction, EMPTY_CELL, OBJECT_WALL};
use crate::kernels::render::hue_to_rgb;
use crate::kernels::{
    cell_index, BufferSlot, Bound, COPY_SPECTATING_TO_ALL_SPEC, UPDATE_CREATURE, UPDATE_CREATURE_SPEC,
};

/// Number of trailing outputs after the action logits.
pub const PARAMETER_OUTPUTS: usize = 3;

const INACTIVE_RGB: [f32; 3] = [0.25, 0.25, 0.25];
const WALL_RGB: [f32; 3] = [0.5, 0.5, 0.5];

/// Immutable view of the network tables, converted once per dispatch.
struct Shape {
    layers: Vec<usize>,
    weight_offsets: Vec<usize>,
    neuron_offsets: Vec<usize>,
    weights_per_agent: usize,
    neurons_per_agent: usize,
}

impl Shape {
    fn load(k: &Bound<'_, '_>) -> ComputeResult<Self> {
        let to_usize = |values: &[i32]| -> Option<Vec<usize>> {
            values.iter().map(|&v| usize::try_from(v).ok()).collect()
        };
        let malformed = || k.fault("network tables hold negative values");

        let layer_count = k.scalar(BufferSlot::LayerCount)?;
        let layers = to_usize(&k.read::<i32>(BufferSlot::LayerSizes)?[..]).ok_or_else(malformed)?;
        let weight_offsets =
            to_usize(&k.read::<i32>(BufferSlot::WeightOffsets)?[..]).ok_or_else(malformed)?;
        let neuron_offsets =
            to_usize(&k.read::<i32>(BufferSlot::NeuronOffsets)?[..]).ok_or_else(malformed)?;
        let weights_per_agent = k.scalar(BufferSlot::WeightsPerAgent)? as usize;
        let neurons_per_agent = k.scalar(BufferSlot::NeuronsPerAgent)? as usize;

        let consistent = layers.len() >= 2
            && layer_count as usize == layers.len()
            && weight_offsets.len() == layers.len()
            && neuron_offsets.len() == layers.len()
            && weight_offsets[0] == 0
            && neuron_offsets[0] == 0
            && weight_offsets.last() == Some(&weights_per_agent)
            && neuron_offsets.last().zip(layers.last()).map(|(o, l)| o + l) == Some(neurons_per_agent)
            && layers.last().is_some_and(|&l| l >= Action::COUNT + PARAMETER_OUTPUTS);
        if !consistent {
            return Err(k.fault("network tables are inconsistent"));
        }

        Ok(Self {
            layers,
            weight_offsets,
            neuron_offsets,
            weights_per_agent,
            neurons_per_agent,
        })
    }

    #[inline]
    fn inputs(&self) -> usize {
        self.layers[0]
    }

    /// Runs the recurrent forward pass over one agent's slices.
    fn forward(&self, weights: &[f32], outputs: &mut [f32]) {
        for l in 1..self.layers.len() {
            let prev = self.layers[l - 1];
            let prev_start = self.neuron_offsets[l - 1];
            let start = self.neuron_offsets[l];
            let base = self.weight_offsets[l - 1];

            for n in 0..self.layers[l] {
                let w = &weights[base + n * (prev + 2)..base + (n + 1) * (prev + 2)];
                let mut sum = w[prev] + w[prev + 1] * outputs[start + n];
                for (i, weight) in w[..prev].iter().enumerate() {
                    sum += weight * outputs[prev_start + i];
                }
                outputs[start + n] = sum.tanh();
            }
        }
    }

    fn final_layer<'o>(&self, outputs: &'o [f32]) -> &'o [f32] {
        let last = self.layers.len() - 1;
        &outputs[self.neuron_offsets[last]..self.neuron_offsets[last] + self.layers[last]]
    }
}

/// What one agent decided this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decision {
    /// Pending action.
    pub action: Action,
    /// Facing direction after an optional rotation.
    pub direction: Direction,
    /// New hue in radians.
    pub hue: f32,
}

/// Read-only world state shared across perception workers.
struct Scene<'s> {
    width: usize,
    height: usize,
    grid: &'s [i32],
    objects: &'s [u8],
    food: &'s [f32],
    hue: &'s [f32],
    energy: &'s [i16],
}

impl Scene<'_> {
    fn color(&self, cell: usize) -> [f32; 3] {
        match self.grid[cell] {
            EMPTY_CELL if self.objects[cell] == OBJECT_WALL => WALL_RGB,
            EMPTY_CELL => [0.0, self.food[cell].clamp(0.0, 1.0), 0.0],
            occupant => {
                let j = occupant as usize;
                if self.energy.get(j).is_some_and(|&e| e > 0) {
                    hue_to_rgb(self.hue[j])
                } else {
                    INACTIVE_RGB
                }
            }
        }
    }
}

fn fault(message: String) -> ComputeError {
    ComputeError::KernelFault {
        kernel: UPDATE_CREATURE.to_owned(),
        message,
    }
}

/// Perceives, runs every agent's network, and writes the pending action,
/// facing direction, and hue.
pub fn update_creature(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&UPDATE_CREATURE_SPEC, args);
    let (width, height) = k.world_size()?;
    let read_generation = k.written_generation()?.other();
    let shape = Shape::load(&k)?;

    let (vision_w, vision_h) = {
        let size = k.read::<i32>(BufferSlot::VisionSize)?;
        match *size {
            [w, h, ..] if w > 0 && h > 0 && w % 2 == 1 && h % 2 == 1 => (w, h),
            _ => return Err(k.fault("vision size must be two positive odd values")),
        }
    };
    if shape.inputs() != (vision_w * vision_h * 3) as usize + 2 {
        return Err(k.fault("input layer does not match the vision window"));
    }

    let grid = k.read::<i32>(BufferSlot::grid(read_generation))?;
    let objects = k.read::<u8>(BufferSlot::Objects)?;
    let food = k.read::<f32>(BufferSlot::Food)?;
    let energy = k.read::<i16>(BufferSlot::Energy)?;
    let success = k.read::<u8>(BufferSlot::LastSuccess)?;
    let x = k.read::<i32>(BufferSlot::CreatureX)?;
    let y = k.read::<i32>(BufferSlot::CreatureY)?;
    let weights = k.read::<f32>(BufferSlot::Weights)?;
    let mut outputs = k.write::<f32>(BufferSlot::NeuronOutputs)?;
    let mut hue = k.write::<f32>(BufferSlot::Hue)?;
    let mut directions = k.write::<u8>(BufferSlot::Direction)?;
    let mut actions = k.write::<u8>(BufferSlot::Action)?;

    let n = k.items(energy.len())?;
    if weights.len() < n * shape.weights_per_agent || outputs.len() < n * shape.neurons_per_agent {
        return Err(k.fault("network buffers are shorter than the population"));
    }

    let scene = Scene {
        width,
        height,
        grid: &grid,
        objects: &objects,
        food: &food,
        hue: &hue,
        energy: &energy,
    };
    let (x, y, success, weights, directions_in): (&[i32], &[i32], &[u8], &[f32], &[u8]) =
        (&x, &y, &success, &weights, &directions);

    let decisions: Vec<Decision> = outputs[..n * shape.neurons_per_agent]
        .par_chunks_mut(shape.neurons_per_agent)
        .enumerate()
        .map(|(id, out)| {
            let direction = Direction::try_from(directions_in[id])
                .map_err(|raw| fault(format!("agent {id} holds invalid direction {raw}")))?;
            if scene.energy[id] <= 0 {
                return Ok(Decision { action: Action::Nothing, direction, hue: scene.hue[id] });
            }

            perceive(&scene, x[id], y[id], direction, vision_w, vision_h, out);
            let here = cell_index(x[id], y[id], width, height);
            out[shape.inputs() - 2] = success[id] as f32;
            out[shape.inputs() - 1] = scene.food[here];

            let w = &weights[id * shape.weights_per_agent..(id + 1) * shape.weights_per_agent];
            shape.forward(w, out);
            Ok(decide(shape.final_layer(out), direction))
        })
        .collect::<ComputeResult<_>>()?;

    drop(scene);
    for (id, decision) in decisions.into_iter().enumerate() {
        actions[id] = decision.action as u8;
        directions[id] = decision.direction as u8;
        hue[id] = decision.hue;
    }
    Ok(())
}

/// Writes the RGB window into the leading slots of `out`.
fn perceive(
    scene: &Scene<'_>,
    x: i32,
    y: i32,
    direction: Direction,
    vision_w: i32,
    vision_h: i32,
    out: &mut [f32],
) {
    let (fx, fy) = direction.offset();
    let (rx, ry) = direction.rotated(true).offset();
    let (half_w, half_h) = (vision_w / 2, vision_h / 2);

    let mut slot = 0;
    for ahead in (-half_h..=half_h).rev() {
        for right in -half_w..=half_w {
            let cx = x + ahead * fx + right * rx;
            let cy = y + ahead * fy + right * ry;
            let rgb = scene.color(cell_index(cx, cy, scene.width, scene.height));
            out[slot..slot + 3].copy_from_slice(&rgb);
            slot += 3;
        }
    }
}

/// Decodes the final layer into an action, facing direction, and hue.
///
/// The action is the first maximum of the leading logits. A rotation turns
/// clockwise when the turn bias is positive. The hue is the angle of the
/// `(hue_x, hue_y)` output pair in `[0, 2π)`.
pub fn decide(last: &[f32], direction: Direction) -> Decision {
    let mut best = 0;
    for (i, &logit) in last[..Action::COUNT].iter().enumerate() {
        if logit > last[best] {
            best = i;
        }
    }
    let action = Action::ALL[best];

    let turn_bias = last[Action::COUNT];
    let direction = if action == Action::Rotate {
        direction.rotated(turn_bias > 0.0)
    } else {
        direction
    };

    let hue = last[Action::COUNT + 2].atan2(last[Action::COUNT + 1]).rem_euclid(TAU);
    Decision { action, direction, hue }
}

/// Copies the weight vector of the agent named by the spectate scalar over
/// every agent's weight vector.
pub fn copy_spectating_to_all(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&COPY_SPECTATING_TO_ALL_SPEC, args);
    let source = k.scalar(BufferSlot::SpectateTarget)?;
    let per_agent = k.scalar(BufferSlot::WeightsPerAgent)? as usize;
    let mut weights = k.write::<f32>(BufferSlot::Weights)?;

    if per_agent == 0 {
        return Err(k.fault("weights per agent must be positive"));
    }
    let n = k.items(weights.len() / per_agent)?;
    let source = usize::try_from(source)
        .ok()
        .filter(|&s| s < n)
        .ok_or_else(|| k.fault(format!("source agent {source} is outside the population")))?;

    let row = weights[source * per_agent..(source + 1) * per_agent].to_vec();
    weights[..n * per_agent]
        .par_chunks_mut(per_agent)
        .for_each(|dst| dst.copy_from_slice(&row));
    Ok(())
}
