//! Core Simulation Types, Identifiers, and Cell Encodings
//!
//! This module defines the **small, copyable types and constants** shared by
//! the host-side engine, the compute layer, and the kernel program. Every value
//! here has a fixed binary meaning on the device, so the definitions double as
//! the data contract between host and kernels.
//!
//! ## Cell encoding
//!
//! Occupancy grids store one `i32` per cell:
//!
//! ```text
//! | -1 (EMPTY_CELL) | 0 .. num_creatures-1 (agent id) |
//! ```
//!
//! Object grids store one `u8` per cell (`OBJECT_NONE` or `OBJECT_WALL`).
//!
//! ## Agent enums
//!
//! [`Direction`] and [`Action`] are stored on the device as raw `u8` values.
//! Conversions from raw bytes are fallible so that a corrupted buffer is
//! reported instead of silently reinterpreted.

use std::fmt;

/// Identifier of an agent, equal to its index into every per-agent array.
pub type AgentId = u32;

/// Simulation tick counter.
pub type Tick = u64;

/// Occupancy sentinel marking a cell with no agent.
pub const EMPTY_CELL: i32 = -1;

/// Object grid value for an open cell.
pub const OBJECT_NONE: u8 = 0;

/// Object grid value for a wall placed by an agent.
pub const OBJECT_WALL: u8 = 1;

/// Number of facing directions.
pub const NUM_DIRECTIONS: u8 = 4;

/// Number of values in the render parameter block
/// (`screen_w, screen_h, center_x, center_y, zoom, progress`).
pub const VIEW_PARAMS_LEN: usize = 6;

/// Facing direction of an agent on the grid.
///
/// Directions are numbered clockwise starting at north, matching the
/// rotation arithmetic `(dir + turn) mod 4` used by the kernels.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward decreasing `y`.
    North = 0,
    /// Toward increasing `x`.
    East = 1,
    /// Toward increasing `y`.
    South = 2,
    /// Toward decreasing `x`.
    West = 3,
}

impl Direction {
    /// All directions in numeric order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit grid offset `(dx, dy)` of this direction.
    #[inline]
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Rotates by a quarter turn clockwise (`true`) or counter-clockwise.
    #[inline]
    pub fn rotated(self, clockwise: bool) -> Direction {
        let step = if clockwise { 1 } else { NUM_DIRECTIONS - 1 };
        Direction::ALL[((self as u8 + step) % NUM_DIRECTIONS) as usize]
    }
}

impl TryFrom<u8> for Direction {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Direction::ALL.get(raw as usize).copied().ok_or(raw)
    }
}

/// Closed action set decoded from the leading neural-network outputs.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Do nothing this tick.
    Nothing = 0,
    /// Step one cell forward.
    Move = 1,
    /// Turn a quarter in the direction chosen by the turn-bias output.
    Rotate = 2,
    /// Consume the food under the agent.
    Eat = 3,
    /// Place a wall on the cell in front.
    PlaceWall = 4,
    /// Drain energy from the agent in front.
    Damage = 5,
    /// Overwrite the network of the agent in front with a mutated copy.
    Copy = 6,
}

impl Action {
    /// Number of actions; equals the number of leading action outputs.
    pub const COUNT: usize = 7;

    /// All actions in output order.
    pub const ALL: [Action; Action::COUNT] = [
        Action::Nothing,
        Action::Move,
        Action::Rotate,
        Action::Eat,
        Action::PlaceWall,
        Action::Damage,
        Action::Copy,
    ];
}

impl TryFrom<u8> for Action {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Action::ALL.get(raw as usize).copied().ok_or(raw)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Nothing => "nothing",
            Action::Move => "move",
            Action::Rotate => "rotate",
            Action::Eat => "eat",
            Action::PlaceWall => "place-wall",
            Action::Damage => "damage",
            Action::Copy => "copy",
        };
        f.write_str(name)
    }
}

/// Which occupancy grid a phase reads from.
///
/// The two grids form a two-slot ring. The device flag `writing_to_a`
/// is the single authoritative selector: when it is `1`, ACT writes grid A and
/// PERCEIVE_DECIDE/ACT read grid B; when `0`, the roles swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridGeneration {
    /// Grid A.
    A,
    /// Grid B.
    B,
}

impl GridGeneration {
    /// Grid written by ACT for the given flag value.
    #[inline]
    pub fn written(writing_to_a: i32) -> GridGeneration {
        if writing_to_a != 0 { GridGeneration::A } else { GridGeneration::B }
    }

    /// Grid read by PERCEIVE_DECIDE and ACT for the given flag value.
    #[inline]
    pub fn read(writing_to_a: i32) -> GridGeneration {
        Self::written(writing_to_a).other()
    }

    /// The opposite generation.
    #[inline]
    pub fn other(self) -> GridGeneration {
        match self {
            GridGeneration::A => GridGeneration::B,
            GridGeneration::B => GridGeneration::A,
        }
    }
}

/// Wraps `x` into `[0, bounds)` on a torus.
#[inline]
pub fn wrap(x: f64, bounds: f64) -> f64 {
    let out = x % bounds;
    if out < 0.0 { out + bounds } else { out }
}

/// Wraps an integer coordinate into `[0, bounds)`.
#[inline]
pub fn wrap_i32(x: i32, bounds: i32) -> i32 {
    x.rem_euclid(bounds)
}
