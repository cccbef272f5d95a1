//! Error types for device compute, configuration, and simulation control.
//!
//! This module declares focused, composable error types used across the
//! compute layer and the simulator. Each error carries enough context to make
//! a failure actionable while remaining cheap to pass around or convert into
//! the aggregate [`SimError`].
//!
//! ## Taxonomy
//! * **Initialization failures**: no adapter, program compilation failure,
//!   invalid configuration. Construction returns the error; no partially built
//!   simulator is ever handed out.
//! * **Invariant violations**: unknown kernel names, binding after the first
//!   dispatch, out-of-range render inputs, use after dispose. These are
//!   programmer errors; they are reported, never recovered or retried.
//!
//! ## Typical flow
//! Low-level compute operations return [`ComputeError`]. The simulator uses
//! `?` to bubble them into [`SimError`]:
//! ```ignore
//! fn upload_all(&mut self) -> SimResult<()> {
//!     self.world.food.upload(&mut self.context)?; // ComputeError -> SimError
//!     Ok(())
//! }
//! ```
//!
//! ## Display vs. Debug
//! * `Display` is short, single-line, suitable for logs.
//! * `Debug` (derived) retains full structure for diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::compute::BufferHandle;
use crate::engine::types::AgentId;

/// Returned when a kernel name is not part of the compiled program.
///
/// ### Example
/// ```ignore
/// let id = registry.lookup(name).ok_or_else(|| UnknownKernelError { name: name.into() })?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kernel `{name}`")]
pub struct UnknownKernelError {
    /// Kernel name that was requested.
    pub name: String,
}

/// Returned when a buffer handle refers to an arena slot that was released.
///
/// This is the typed "moved-out" state of a device buffer: once released, a
/// handle can never reach device memory again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("device buffer {handle} was already released")]
pub struct BufferReleasedError {
    /// Handle of the released buffer.
    pub handle: BufferHandle,
}

/// Returned when the requested population cannot be placed on the grid.
///
/// Rejection sampling only terminates when at least one cell stays free, so
/// construction requires strictly fewer creatures than cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{creatures} creatures do not fit a world of {cells} cells")]
pub struct OvercrowdedError {
    /// Requested number of creatures.
    pub creatures: usize,

    /// Number of cells in the world.
    pub cells: usize,
}

/// Failures of the compute layer: device selection, program compilation,
/// buffer transfers, argument binding, and dispatch.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// No usable adapter or device could be selected.
    #[error("no compute device available: {message}")]
    NoDevice {
        /// Backend-specific detail.
        message: String,
    },

    /// The kernel program source could not be read.
    #[error("failed to read kernel program {path:?}: {source}")]
    ProgramSource {
        /// Location of the program source.
        path: PathBuf,

        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The kernel program failed to compile or lacks a required entry point.
    #[error("kernel program failed to compile: {message}")]
    ProgramCompile {
        /// Compiler or validation output.
        message: String,
    },

    /// A dispatch or lookup named a kernel the program does not expose.
    #[error(transparent)]
    UnknownKernel(#[from] UnknownKernelError),

    /// A buffer was bound to a kernel that has already been dispatched.
    #[error("cannot bind argument {arg} of kernel `{kernel}` after its first dispatch")]
    BindAfterDispatch {
        /// Kernel name.
        kernel: String,

        /// Argument index.
        arg: u32,
    },

    /// A kernel was dispatched with an argument slot left unbound.
    #[error("argument {arg} of kernel `{kernel}` is not bound")]
    UnboundArgument {
        /// Kernel name.
        kernel: String,

        /// Argument index.
        arg: u32,
    },

    /// A kernel read an argument with the wrong element type or borrowed it twice.
    #[error("argument {arg} of kernel `{kernel}`: {detail}")]
    ArgumentMismatch {
        /// Kernel name.
        kernel: String,

        /// Argument index.
        arg: u32,

        /// What went wrong.
        detail: String,
    },

    /// A buffer handle was used after release.
    #[error(transparent)]
    BufferReleased(#[from] BufferReleasedError),

    /// A transfer length did not match the device allocation.
    #[error("buffer `{label}` holds {expected} bytes, transfer has {actual}")]
    SizeMismatch {
        /// Buffer label.
        label: String,

        /// Device allocation size in bytes.
        expected: usize,

        /// Host transfer size in bytes.
        actual: usize,
    },

    /// A kernel reported corrupt input data.
    #[error("kernel `{kernel}` failed: {message}")]
    KernelFault {
        /// Kernel name.
        kernel: String,

        /// Description of the corrupt state.
        message: String,
    },

    /// Waiting on the device failed.
    #[error("device synchronization failed: {message}")]
    Synchronization {
        /// Backend-specific detail.
        message: String,
    },

    /// The context was disposed; no further device work is possible.
    #[error("compute context has been disposed")]
    Disposed,
}

/// Invalid simulation configuration, detected before any device work.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// World width or height is zero.
    #[error("world must be non-empty (got {width}x{height})")]
    EmptyWorld {
        /// Requested width.
        width: u32,

        /// Requested height.
        height: u32,
    },

    /// The population is empty.
    #[error("at least one creature is required")]
    NoCreatures,

    /// More creatures than can be placed.
    #[error(transparent)]
    Overcrowded(#[from] OvercrowdedError),

    /// The network layer list is unusable.
    #[error("invalid network topology: {reason}")]
    Topology {
        /// Why the topology was rejected.
        reason: String,
    },

    /// A scalar field is outside its valid range.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidField {
        /// Field name as written in the config file.
        field: &'static str,

        /// Why it was rejected.
        reason: String,
    },

    /// The config file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    Io {
        /// Config file location.
        path: PathBuf,

        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::SimulationConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Aggregate error for everything the [`crate::Simulator`] exposes.
#[derive(Debug, Error)]
pub enum SimError {
    /// Compute layer failure.
    #[error(transparent)]
    Compute(#[from] ComputeError),

    /// Configuration rejected at construction.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Render zoom must be finite and at least 1.
    #[error("zoom must be finite and >= 1 (got {0})")]
    InvalidZoom(f32),

    /// Render progress must lie in `[0, 1]`.
    #[error("progress must lie in [0, 1] (got {0})")]
    InvalidProgress(f32),

    /// An agent id outside the population was supplied.
    #[error("agent {id} out of range (population {population})")]
    AgentOutOfRange {
        /// Offending id.
        id: AgentId,

        /// Population size.
        population: usize,
    },

    /// The simulator was disposed; no further calls are valid.
    #[error("simulator has been disposed")]
    Disposed,
}

/// Result alias used by the compute layer.
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Result alias used by the simulator API.
pub type SimResult<T> = Result<T, SimError>;
