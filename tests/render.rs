// Run:
//   cargo test --test render -- --nocapture

mod common;

use common::*;

use creature_sim::kernels::render::{hue_to_rgb, pack_rgb, FOOD_FULL_BRIGHTNESS};
use creature_sim::kernels::{RENDER_FOREGROUND_DETAILED, RENDER_FOREGROUND_SIMPLE};
use creature_sim::{ForegroundKernel, RenderRequest, SimError, SimResult};

#[test]
fn zoom_selects_foreground_variant() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;

    let cases = [
        (8.0, ForegroundKernel::Detailed),
        (4.0, ForegroundKernel::Simple),
        (2.0, ForegroundKernel::Simple),
        (1.0, ForegroundKernel::Simple),
    ];
    for (zoom, expected) in cases {
        let outcome = sim.render(RenderRequest::at(8.0, 8.0, zoom))?;
        assert_eq!(outcome.foreground, expected, "zoom {zoom}");
    }
    assert_eq!(sim.context().dispatch_count(RENDER_FOREGROUND_DETAILED)?, 1);
    assert_eq!(sim.context().dispatch_count(RENDER_FOREGROUND_SIMPLE)?, 3);
    Ok(())
}

#[test]
fn invalid_camera_inputs_are_rejected() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;

    for zoom in [0.5, 0.0, -2.0, f32::NAN, f32::INFINITY] {
        let err = sim.render(RenderRequest::at(8.0, 8.0, zoom)).unwrap_err();
        assert!(matches!(err, SimError::InvalidZoom(_)), "zoom {zoom}: {err}");
    }
    for progress in [-0.1, 1.5, f32::NAN] {
        let err = sim
            .render(RenderRequest::at(8.0, 8.0, 2.0).with_progress(progress))
            .unwrap_err();
        assert!(matches!(err, SimError::InvalidProgress(_)), "progress {progress}: {err}");
    }
    let err = sim.render(RenderRequest::at(8.0, 8.0, 2.0).spectating(CREATURES)).unwrap_err();
    assert!(matches!(err, SimError::AgentOutOfRange { .. }));

    assert_eq!(sim.context().dispatch_count(RENDER_FOREGROUND_SIMPLE)?, 0);
    Ok(())
}

#[test]
fn frame_is_opaque_and_screen_sized() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;
    sim.run(5)?;
    sim.render(RenderRequest::at(3.0, 12.5, 6.0).with_progress(0.5))?;

    let frame = sim.framebuffer()?;
    assert_eq!(frame.len(), (SCREEN_W * SCREEN_H) as usize);
    assert!(frame.iter().all(|&p| p >> 24 == 0xFF));
    Ok(())
}

#[test]
fn simple_view_plots_creatures_over_food() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;
    let snap = sim.snapshot()?;
    sim.render(RenderRequest::at(8.0, 8.0, 1.0))?;
    let frame = sim.framebuffer()?;

    // At zoom 1 centered on (8, 8), cell (cx, cy) lands on pixel
    // ((cx + 8) % 16, (cy + 4) % 16) of the 32x24 screen.
    let pixel = |cx: usize, cy: usize| frame[(cx + 8) % 16 + ((cy + 4) % 16) * SCREEN_W as usize];

    for id in 0..snap.population() {
        let (x, y) = (snap.x[id] as usize, snap.y[id] as usize);
        assert_eq!(pixel(x, y), pack_rgb(hue_to_rgb(snap.hue[id])), "agent {id}");
    }

    let cell = (0..snap.food.len())
        .find(|&c| snap.grid_a[c] == creature_sim::EMPTY_CELL)
        .expect("an empty cell");
    let (x, y) = (cell % 16, cell / 16);
    let food = snap.food[cell] / FOOD_FULL_BRIGHTNESS;
    assert_eq!(pixel(x, y), pack_rgb([0.0, food, 0.0]));
    Ok(())
}

#[test]
fn spectate_moves_camera_onto_creature() -> SimResult<()> {
    let mut sim = small_sim(SEED)?;
    let snap = sim.snapshot()?;

    let outcome = sim.render(RenderRequest::at(0.0, 0.0, 8.0).spectating(3))?;
    assert_eq!(outcome.center, (snap.x[3] as f32 + 0.5, snap.y[3] as f32 + 0.5));

    sim.tick()?;
    let snap = sim.snapshot()?;
    let start = sim.render(RenderRequest::at(0.0, 0.0, 2.0).spectating(3))?;
    assert_eq!(start.center, (snap.prev_x[3] as f32 + 0.5, snap.prev_y[3] as f32 + 0.5));

    let end = sim.render(RenderRequest::at(0.0, 0.0, 2.0).with_progress(1.0).spectating(3))?;
    assert_eq!(end.center, (snap.x[3] as f32 + 0.5, snap.y[3] as f32 + 0.5));
    Ok(())
}

#[test]
fn hue_wheel_primaries() {
    assert_eq!(pack_rgb(hue_to_rgb(0.0)), 0xFFFF_0000);
    assert_eq!(pack_rgb(hue_to_rgb(std::f32::consts::TAU / 3.0)), 0xFF00_FF00);
    assert_eq!(pack_rgb(hue_to_rgb(std::f32::consts::TAU * 2.0 / 3.0)), 0xFF00_00FF);
    assert_eq!(pack_rgb([2.0, -1.0, 0.5]), 0xFFFF_0080);
}
