use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use creature_sim::{RenderRequest, SimulationConfig, Simulator};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "creature-headless")]
#[command(about = "Runs a creature simulation without a window")]
struct Cli {
    /// TOML configuration; the bundled config/default.toml when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 1000)]
    ticks: u64,
    /// Log population statistics every N ticks (0 disables).
    #[arg(long, default_value_t = 100)]
    stats_every: u64,
    /// Overrides the seed from the configuration.
    #[arg(long)]
    seed: Option<u64>,
    /// Renders the final state and writes it as a binary PPM.
    #[arg(long)]
    frame_out: Option<PathBuf>,
    #[arg(long, default_value_t = 1.0)]
    zoom: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => default_config()?,
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let mut sim = Simulator::new(config).context("building simulator")?;
    let started = Instant::now();
    for _ in 0..cli.ticks {
        sim.tick()?;
        let tick = sim.current_tick();
        if cli.stats_every > 0 && tick % cli.stats_every == 0 {
            let stats = sim.stats()?;
            info!(
                tick,
                living = stats.living,
                north = stats.directions[0],
                east = stats.directions[1],
                south = stats.directions[2],
                west = stats.directions[3],
                mean_energy = stats.mean_energy,
                walls = stats.walls,
                food = stats.total_food,
                "population"
            );
        }
    }
    let elapsed = started.elapsed();
    info!(
        ticks = cli.ticks,
        elapsed_ms = elapsed.as_millis() as u64,
        ms_per_tick = elapsed.as_secs_f64() * 1000.0 / cli.ticks.max(1) as f64,
        "run finished"
    );

    if let Some(path) = &cli.frame_out {
        let (cx, cy) = (sim.config().world_width as f32 * 0.5, sim.config().world_height as f32 * 0.5);
        sim.render(RenderRequest::at(cx, cy, cli.zoom))?;
        let (w, h) = (sim.config().framebuffer_width, sim.config().framebuffer_height);
        write_ppm(path, w, h, sim.framebuffer()?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "frame written");
    }

    sim.dispose()?;
    Ok(())
}

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

fn default_config() -> Result<SimulationConfig> {
    SimulationConfig::parse(DEFAULT_CONFIG).context("parsing the built-in config/default.toml")
}

fn write_ppm(path: &Path, width: u32, height: u32, pixels: &[u32]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{width} {height}\n255\n")?;
    for &p in pixels {
        out.write_all(&[(p >> 16) as u8, (p >> 8) as u8, p as u8])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_config_is_the_shipped_file() {
        let config = default_config().expect("bundled config parses");
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml");
        let on_disk = SimulationConfig::load(path).expect("shipped config loads");
        assert_eq!(config, on_disk);
        assert_eq!(config.creatures, config.world_width * config.world_height / 32 + 1);
    }
}
