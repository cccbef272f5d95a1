//! Framebuffer kernels: background, foreground, and the spectate camera.
//!
//! ## Camera
//!
//! The view block holds `screen_w, screen_h, center_x, center_y, zoom,
//! progress`. Pixel `(px, py)` samples the world point
//! `center + (pixel + 0.5 - screen / 2) / zoom`, wrapped onto the torus.
//!
//! ## Pixels
//!
//! Pixels are `0xAARRGGBB` words with opaque alpha. The background writes every
//! pixel; the foregrounds only overwrite pixels covered by agents (and, in
//! the detailed view, by their selection highlights).

use std::f32::consts::TAU;

use rayon::prelude::*;

use crate::compute::KernelArgs;
use crate::engine::error::ComputeResult;
use crate::engine::types::{wrap, OBJECT_WALL, VIEW_PARAMS_LEN};
use crate::kernels::{
    cell_index, BufferSlot, Bound, KernelSpec, RENDER_BACKGROUND_SPEC,
    RENDER_FOREGROUND_DETAILED_SPEC, RENDER_FOREGROUND_SIMPLE_SPEC, SPECTATE_CREATURE_SPEC,
};

/// Food level drawn at full green.
pub const FOOD_FULL_BRIGHTNESS: f32 = 0.25;

/// Fraction of a cell drawn as an agent's outline in the detailed view.
pub const BODY_BORDER: f32 = 0.12;

const WALL_RGB: [f32; 3] = [0.55, 0.55, 0.55];
const INACTIVE_RGB: [f32; 3] = [0.3, 0.3, 0.3];

/// Fully saturated, full-value color of a hue in radians.
pub fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue.rem_euclid(TAU) / TAU * 6.0;
    let sector = (h.floor() as i32).clamp(0, 5);
    let f = h - sector as f32;
    match sector {
        0 => [1.0, f, 0.0],
        1 => [1.0 - f, 1.0, 0.0],
        2 => [0.0, 1.0, f],
        3 => [0.0, 1.0 - f, 1.0],
        4 => [f, 0.0, 1.0],
        _ => [1.0, 0.0, 1.0 - f],
    }
}

/// Packs an RGB triple in `[0, 1]` into an opaque `0xAARRGGBB` pixel.
#[inline]
pub fn pack_rgb(rgb: [f32; 3]) -> u32 {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
    0xFF00_0000 | (channel(rgb[0]) << 16) | (channel(rgb[1]) << 8) | channel(rgb[2])
}

#[inline]
fn blend_white(pixel: u32, amount: f32) -> u32 {
    let channel = |shift: u32| {
        let v = ((pixel >> shift) & 0xFF) as f32;
        ((v + (255.0 - v) * amount).round() as u32).min(255) << shift
    };
    0xFF00_0000 | channel(16) | channel(8) | channel(0)
}

/// Shortest signed difference on a ring of `size`.
#[inline]
fn ring_delta(d: i32, size: i32) -> i32 {
    (d + size / 2).rem_euclid(size) - size / 2
}

#[inline]
fn ring_delta_f32(d: f32, size: f32) -> f32 {
    d - size * (d / size).round()
}

/// Camera parameters decoded from the view block.
#[derive(Clone, Copy)]
struct View {
    screen_w: usize,
    screen_h: usize,
    center_x: f32,
    center_y: f32,
    zoom: f32,
    progress: f32,
}

impl View {
    fn load(k: &Bound<'_, '_>) -> ComputeResult<Self> {
        let params = k.read::<f32>(BufferSlot::ViewParams)?;
        if params.len() < VIEW_PARAMS_LEN || params[0] < 1.0 || params[1] < 1.0 || params[4] <= 0.0 {
            return Err(k.fault("view parameters are malformed"));
        }
        Ok(Self {
            screen_w: params[0] as usize,
            screen_h: params[1] as usize,
            center_x: params[2],
            center_y: params[3],
            zoom: params[4],
            progress: params[5].clamp(0.0, 1.0),
        })
    }

    /// World point sampled by pixel `p`, wrapped into `[0, w) × [0, h)`.
    fn world_point(&self, p: usize, width: usize, height: usize) -> (f32, f32) {
        let px = (p % self.screen_w) as f32 + 0.5 - self.screen_w as f32 * 0.5;
        let py = (p / self.screen_w) as f32 + 0.5 - self.screen_h as f32 * 0.5;
        let wx = wrap((self.center_x + px / self.zoom) as f64, width as f64) as f32;
        let wy = wrap((self.center_y + py / self.zoom) as f64, height as f64) as f32;
        (wx, wy)
    }

    /// Cell containing a wrapped world point.
    fn cell(&self, (wx, wy): (f32, f32), width: usize, height: usize) -> (i32, i32) {
        (
            (wx as i32).min(width as i32 - 1),
            (wy as i32).min(height as i32 - 1),
        )
    }
}

/// Draws food in green and walls in gray over every pixel.
pub fn background(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&RENDER_BACKGROUND_SPEC, args);
    let (width, height) = k.world_size()?;
    let view = View::load(&k)?;
    let food = k.read::<f32>(BufferSlot::Food)?;
    let objects = k.read::<u8>(BufferSlot::Objects)?;
    let mut frame = k.write::<u32>(BufferSlot::Framebuffer)?;

    if food.len() < width * height || objects.len() < width * height {
        return Err(k.fault("world buffers are smaller than the world"));
    }
    let pixels = k.items(frame.len())?;
    let (food, objects): (&[f32], &[u8]) = (&food, &objects);

    frame[..pixels].par_iter_mut().enumerate().for_each(|(p, pixel)| {
        let (cx, cy) = view.cell(view.world_point(p, width, height), width, height);
        let cell = cx as usize + cy as usize * width;
        *pixel = if objects[cell] == OBJECT_WALL {
            pack_rgb(WALL_RGB)
        } else {
            pack_rgb([0.0, food[cell] / FOOD_FULL_BRIGHTNESS, 0.0])
        };
    });
    Ok(())
}

/// Agent buffers shared by both foreground kernels.
struct Agents<'s> {
    grid: &'s [i32],
    x: &'s [i32],
    y: &'s [i32],
    px: &'s [i32],
    py: &'s [i32],
    select_x: &'s [i8],
    select_y: &'s [i8],
    hue: &'s [f32],
    energy: &'s [i16],
}

impl Agents<'_> {
    fn occupant(&self, cell: usize) -> Option<usize> {
        usize::try_from(self.grid[cell]).ok().filter(|&j| j < self.energy.len())
    }

    fn color(&self, j: usize) -> [f32; 3] {
        if self.energy[j] > 0 { hue_to_rgb(self.hue[j]) } else { INACTIVE_RGB }
    }
}

fn foreground(
    spec: &'static KernelSpec,
    args: &KernelArgs<'_>,
    detailed: bool,
) -> ComputeResult<()> {
    let k = Bound::new(spec, args);
    let (width, height) = k.world_size()?;
    let written = k.written_generation()?;
    let view = View::load(&k)?;

    let grid = k.read::<i32>(BufferSlot::grid(written))?;
    let x = k.read::<i32>(BufferSlot::CreatureX)?;
    let y = k.read::<i32>(BufferSlot::CreatureY)?;
    let px = k.read::<i32>(BufferSlot::PrevX)?;
    let py = k.read::<i32>(BufferSlot::PrevY)?;
    let select_x = k.read::<i8>(BufferSlot::SelectX)?;
    let select_y = k.read::<i8>(BufferSlot::SelectY)?;
    let hue = k.read::<f32>(BufferSlot::Hue)?;
    let energy = k.read::<i16>(BufferSlot::Energy)?;
    let mut frame = k.write::<u32>(BufferSlot::Framebuffer)?;

    let n = energy.len();
    let lengths = [x.len(), y.len(), px.len(), py.len(), select_x.len(), select_y.len(), hue.len()];
    if grid.len() < width * height || lengths.iter().any(|&len| len < n) {
        return Err(k.fault("agent buffers have inconsistent lengths"));
    }
    let pixels = k.items(frame.len())?;

    let agents = Agents {
        grid: &grid,
        x: &x,
        y: &y,
        px: &px,
        py: &py,
        select_x: &select_x,
        select_y: &select_y,
        hue: &hue,
        energy: &energy,
    };

    frame[..pixels].par_iter_mut().enumerate().for_each(|(p, pixel)| {
        let point = view.world_point(p, width, height);
        if detailed {
            draw_detailed(&agents, &view, point, width, height, pixel);
        } else {
            let (cx, cy) = view.cell(point, width, height);
            if let Some(j) = agents.occupant(cx as usize + cy as usize * width) {
                *pixel = pack_rgb(agents.color(j));
            }
        }
    });
    Ok(())
}

/// Draws interpolated agent bodies and selection highlights over one pixel.
fn draw_detailed(
    agents: &Agents<'_>,
    view: &View,
    (wx, wy): (f32, f32),
    width: usize,
    height: usize,
    pixel: &mut u32,
) {
    let (cx, cy) = view.cell((wx, wy), width, height);
    let here = cell_index(cx, cy, width, height);
    let (w, h) = (width as i32, height as i32);

    let mut body = None;
    for oy in -1..=1 {
        for ox in -1..=1 {
            let Some(j) = agents.occupant(cell_index(cx + ox, cy + oy, width, height)) else {
                continue;
            };

            let (sx, sy) = (agents.select_x[j] as i32, agents.select_y[j] as i32);
            if (sx, sy) != (0, 0)
                && cell_index(agents.x[j] + sx, agents.y[j] + sy, width, height) == here
            {
                *pixel = blend_white(*pixel, 0.35);
            }

            let ax = agents.px[j] as f32 + ring_delta(agents.x[j] - agents.px[j], w) as f32 * view.progress;
            let ay = agents.py[j] as f32 + ring_delta(agents.y[j] - agents.py[j], h) as f32 * view.progress;
            let lx = ring_delta_f32(wx - ax, width as f32);
            let ly = ring_delta_f32(wy - ay, height as f32);
            if (0.0..1.0).contains(&lx) && (0.0..1.0).contains(&ly) {
                let rgb = agents.color(j);
                let edge = lx < BODY_BORDER
                    || ly < BODY_BORDER
                    || lx > 1.0 - BODY_BORDER
                    || ly > 1.0 - BODY_BORDER;
                body = Some(if edge { pack_rgb(rgb.map(|c| c * 0.5)) } else { pack_rgb(rgb) });
            }
        }
    }
    if let Some(color) = body {
        *pixel = color;
    }
}

/// Colors each pixel whose cell holds an agent.
pub fn foreground_simple(args: &KernelArgs<'_>) -> ComputeResult<()> {
    foreground(&RENDER_FOREGROUND_SIMPLE_SPEC, args, false)
}

/// Draws agents as outlined squares interpolated between their previous and
/// current cells, plus the cell each agent last targeted.
pub fn foreground_detailed(args: &KernelArgs<'_>) -> ComputeResult<()> {
    foreground(&RENDER_FOREGROUND_DETAILED_SPEC, args, true)
}

/// Moves the camera center onto the interpolated body center of the
/// spectated agent.
pub fn spectate_creature(args: &KernelArgs<'_>) -> ComputeResult<()> {
    let k = Bound::new(&SPECTATE_CREATURE_SPEC, args);
    let (width, height) = k.world_size()?;
    let target = k.scalar(BufferSlot::SpectateTarget)?;
    let x = k.read::<i32>(BufferSlot::CreatureX)?;
    let y = k.read::<i32>(BufferSlot::CreatureY)?;
    let px = k.read::<i32>(BufferSlot::PrevX)?;
    let py = k.read::<i32>(BufferSlot::PrevY)?;
    let mut view = k.write::<f32>(BufferSlot::ViewParams)?;

    if k.items(1)? == 0 {
        return Ok(());
    }
    let population = x.len().min(y.len()).min(px.len()).min(py.len());
    let j = usize::try_from(target)
        .ok()
        .filter(|&j| j < population)
        .ok_or_else(|| k.fault(format!("spectated agent {target} is outside the population")))?;
    if view.len() < VIEW_PARAMS_LEN {
        return Err(k.fault("view parameters are malformed"));
    }

    let progress = view[5].clamp(0.0, 1.0);
    let (w, h) = (width as i32, height as i32);
    let cx = px[j] as f32 + ring_delta(x[j] - px[j], w) as f32 * progress + 0.5;
    let cy = py[j] as f32 + ring_delta(y[j] - py[j], h) as f32 * progress + 0.5;
    view[2] = wrap(cx as f64, width as f64) as f32;
    view[3] = wrap(cy as f64, height as f64) as f32;
    Ok(())
}
