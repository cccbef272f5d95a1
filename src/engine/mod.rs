//! # Engine Module
//!
//! Host-side simulation engine.
//!
//! This module contains the state and control building blocks:
//! - Shared types, errors, and the seeded generator
//! - Configuration and the network memory layout
//! - World, population, and network buffer groups
//! - Tick/render phase ordering and the simulator itself
//! - Snapshots and population statistics
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod random;
pub mod config;
pub mod layout;
pub mod world;
pub mod population;
pub mod network;
pub mod pipeline;
pub mod snapshot;
pub mod simulator;
