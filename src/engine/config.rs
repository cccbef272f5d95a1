//! Simulation configuration.
//!
//! A [`SimulationConfig`] carries the five required construction parameters
//! (world size, creature count, kernel program, seed) plus tunables that
//! default to the classic setup. Configurations can be built in code with
//! [`SimulationConfig::new`] or read from TOML with [`SimulationConfig::load`]:
//!
//! ```toml
//! world_width = 640
//! world_height = 360
//! creatures = 7201
//! seed = 42
//!
//! [program]
//! kind = "reference"
//!
//! [network]
//! hidden_layers = [20, 18, 18, 18, 15]
//! ```
//!
//! Every field except the required five may be omitted.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::error::{ConfigError, OvercrowdedError};
use crate::engine::layout::NetworkTopology;
use crate::engine::types::Action;
use crate::kernels::brain::PARAMETER_OUTPUTS;

/// Where the kernel program comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgramSource {
    /// Built-in host implementation of every kernel.
    #[default]
    Reference,
    /// WGSL program file run by the `wgpu` backend (feature `gpu`).
    Wgsl {
        /// Path to the `.wgsl` source.
        path: PathBuf,
    },
}

/// Neural network shape shared by every creature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Cells seen on each side of the creature; the window is `2r + 1` wide.
    #[serde(default = "default_vision_radius")]
    pub vision_radius: u32,

    /// Sizes of the layers between input and output.
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<u32>,

    /// Width of the output layer.
    #[serde(default = "default_outputs")]
    pub outputs: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vision_radius: default_vision_radius(),
            hidden_layers: default_hidden_layers(),
            outputs: default_outputs(),
        }
    }
}

impl NetworkConfig {
    /// Side length of the square vision window.
    pub fn vision_width(&self) -> u32 {
        self.vision_radius * 2 + 1
    }

    /// Width of the input layer: three color channels per window cell, then
    /// last-action-success and the food underfoot.
    pub fn inputs(&self) -> u32 {
        self.vision_width() * self.vision_width() * 3 + 2
    }

    /// Full layer list, input to output.
    pub fn layers(&self) -> Vec<usize> {
        std::iter::once(self.inputs())
            .chain(self.hidden_layers.iter().copied())
            .chain(std::iter::once(self.outputs))
            .map(|n| n as usize)
            .collect()
    }

    /// Derives the offset tables for this shape.
    pub fn topology(&self) -> Result<NetworkTopology, ConfigError> {
        NetworkTopology::new(&self.layers())
    }
}

/// Energy and food tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsConfig {
    /// Minimum starting energy.
    #[serde(default = "default_initial_energy")]
    pub initial_energy: i16,

    /// Starting energy is `initial_energy + |rand| mod energy_variance`.
    #[serde(default = "default_energy_variance")]
    pub energy_variance: u32,

    /// Food grows and spreads every `food_period` ticks.
    #[serde(default = "default_food_period")]
    pub food_period: u64,

    /// Zoom above which the detailed foreground is drawn.
    #[serde(default = "default_detail_zoom")]
    pub detail_zoom: f32,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            initial_energy: default_initial_energy(),
            energy_variance: default_energy_variance(),
            food_period: default_food_period(),
            detail_zoom: default_detail_zoom(),
        }
    }
}

/// Complete description of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// World width in cells.
    pub world_width: u32,

    /// World height in cells.
    pub world_height: u32,

    /// Fixed population size.
    pub creatures: u32,

    /// Seed of every host-initialized buffer.
    pub seed: u64,

    /// Kernel program to compile.
    #[serde(default)]
    pub program: ProgramSource,

    /// Framebuffer width in pixels.
    #[serde(default = "default_framebuffer_width")]
    pub framebuffer_width: u32,

    /// Framebuffer height in pixels.
    #[serde(default = "default_framebuffer_height")]
    pub framebuffer_height: u32,

    /// Network shape.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Energy and food tunables.
    #[serde(default)]
    pub dynamics: DynamicsConfig,
}

fn default_vision_radius() -> u32 {
    2
}

fn default_hidden_layers() -> Vec<u32> {
    vec![20, 18, 18, 18, 15]
}

fn default_outputs() -> u32 {
    (Action::COUNT + PARAMETER_OUTPUTS) as u32
}

fn default_initial_energy() -> i16 {
    200
}

fn default_energy_variance() -> u32 {
    6000
}

fn default_food_period() -> u64 {
    32
}

fn default_detail_zoom() -> f32 {
    4.0
}

fn default_framebuffer_width() -> u32 {
    640
}

fn default_framebuffer_height() -> u32 {
    360
}

impl SimulationConfig {
    /// Builds a configuration from the required parameters, with every
    /// tunable at its default.
    pub fn new(
        world_width: u32,
        world_height: u32,
        creatures: u32,
        program: ProgramSource,
        seed: u64,
    ) -> Self {
        Self {
            world_width,
            world_height,
            creatures,
            seed,
            program,
            framebuffer_width: default_framebuffer_width(),
            framebuffer_height: default_framebuffer_height(),
            network: NetworkConfig::default(),
            dynamics: DynamicsConfig::default(),
        }
    }

    /// Sets the framebuffer size.
    pub fn with_framebuffer(mut self, width: u32, height: u32) -> Self {
        self.framebuffer_width = width;
        self.framebuffer_height = height;
        self
    }

    /// Reads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses and validates TOML configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of cells in the world.
    pub fn cells(&self) -> usize {
        self.world_width as usize * self.world_height as usize
    }

    /// Number of framebuffer pixels.
    pub fn pixels(&self) -> usize {
        self.framebuffer_width as usize * self.framebuffer_height as usize
    }

    /// Checks every constraint construction relies on.
    ///
    /// ## Errors
    /// * `EmptyWorld` for a zero width or height.
    /// * `NoCreatures` for an empty population.
    /// * `Overcrowded` unless there are strictly fewer creatures than cells,
    ///   which bounds the rejection sampling used for placement.
    /// * `Topology` for a network the kernels cannot evaluate.
    /// * `InvalidField` for out-of-range tunables, a world with more cells than
    ///   an `i32` can index, or a framebuffer with more pixels than a `u32`
    ///   work size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_width == 0 || self.world_height == 0 {
            return Err(ConfigError::EmptyWorld {
                width: self.world_width,
                height: self.world_height,
            });
        }
        if self.creatures == 0 {
            return Err(ConfigError::NoCreatures);
        }
        if self.creatures as usize >= self.cells() {
            return Err(OvercrowdedError {
                creatures: self.creatures as usize,
                cells: self.cells(),
            }
            .into());
        }
        if i32::try_from(self.cells()).is_err() {
            return Err(invalid("world_width", "world has more cells than an i32 can index"));
        }
        if self.framebuffer_width == 0 || self.framebuffer_height == 0 {
            return Err(invalid("framebuffer_width", "framebuffer must be non-empty"));
        }
        if u32::try_from(self.pixels()).is_err() {
            return Err(invalid(
                "framebuffer_width",
                "framebuffer has more pixels than one dispatch can cover",
            ));
        }

        let expected_outputs = (Action::COUNT + PARAMETER_OUTPUTS) as u32;
        if self.network.outputs != expected_outputs {
            return Err(ConfigError::Topology {
                reason: format!(
                    "output layer must have {expected_outputs} neurons, got {}",
                    self.network.outputs
                ),
            });
        }
        if self.network.vision_radius > 15 {
            return Err(invalid("vision_radius", "must be at most 15"));
        }
        self.network.topology()?;

        let dynamics = &self.dynamics;
        if dynamics.initial_energy <= 0 {
            return Err(invalid("initial_energy", "must be positive"));
        }
        if dynamics.energy_variance == 0 {
            return Err(invalid("energy_variance", "must be positive"));
        }
        if dynamics.initial_energy as i64 + dynamics.energy_variance as i64 > i16::MAX as i64 + 1 {
            return Err(invalid("energy_variance", "starting energy would overflow an i16"));
        }
        if dynamics.food_period == 0 {
            return Err(invalid("food_period", "must be positive"));
        }
        if !dynamics.detail_zoom.is_finite() || dynamics.detail_zoom < 1.0 {
            return Err(invalid("detail_zoom", "must be finite and at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidField { field, reason: reason.to_owned() }
}
