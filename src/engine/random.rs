//! Seeded host generator and per-cell device entropy.
//!
//! Two sources of randomness exist, with different contracts:
//!
//! # Host seeding
//!
//! [`SeedStream`] wraps a `ChaCha8Rng` seeded from the caller's 64-bit seed.
//! It is used exactly once, during construction, to fill every initial
//! buffer. Two simulators built from the same seed and configuration draw the
//! same sequence and therefore start bit-identical.
//!
//! # Device entropy
//!
//! The random field holds one `i32` per cell. Kernels never call back to the
//! host for randomness; instead they advance the word of the cell they own with
//! [`xorshift32`] and write it back. Because each cell word is owned by at most
//! one work item per phase (the agent standing on it, or the cell itself in
//! food phases), the field evolves deterministically without synchronization.
//!
//! # Non-goals
//!
//! - Neither source is cryptographically secure.
//! - Statistical quality beyond the seeding contract is not promised.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Deterministic host-side generator used to initialize simulation buffers.
#[derive(Debug, Clone)]
pub struct SeedStream {
    rng: ChaCha8Rng,
}

impl SeedStream {
    /// Creates a stream from a 64-bit seed.
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }

    /// Uniform signed 32-bit integer over the full range.
    #[inline]
    pub fn next_int(&mut self) -> i32 {
        self.rng.random::<i32>()
    }

    /// `|next_int()| mod bound`, with `bound > 0`.
    #[inline]
    pub fn next_abs_mod(&mut self, bound: u32) -> u32 {
        self.next_int().unsigned_abs() % bound
    }

    /// Uniform `f32` in `[0, 1)`.
    #[inline]
    pub fn next_float(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Uniform `f64` in `[0, 1)`.
    #[inline]
    pub fn next_double(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform `f32` in `[-1, 1)`.
    #[inline]
    pub fn next_signed_unit(&mut self) -> f32 {
        self.next_float() * 2.0 - 1.0
    }

    /// Uniform index in `[0, bound)` drawn by scaling a float, as the grid
    /// placement does.
    #[inline]
    pub fn next_scaled(&mut self, bound: u32) -> u32 {
        ((self.next_float() * bound as f32) as u32).min(bound - 1)
    }
}

/// Advances a per-cell entropy word.
///
/// A zero state would be a fixed point, so it is remapped to a non-zero
/// constant before stepping.
#[inline]
pub fn xorshift32(state: u32) -> u32 {
    let mut x = if state == 0 { 0x9E37_79B9 } else { state };
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    x
}

/// Maps an entropy word to `[0, 1)`.
#[inline]
pub fn unit_f32(bits: u32) -> f32 {
    (bits >> 8) as f32 / (1u32 << 24) as f32
}
