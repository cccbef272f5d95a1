//! # Compute Layer
//!
//! Device-buffer and kernel-binding abstraction shared by every simulation
//! component.
//!
//! ## Components
//! * [`ComputeContext`]: owned device session (buffer arena, kernel registry,
//!   dispatch, completion barrier, dispose ordering).
//! * [`DeviceArray`]: typed host vector mirrored by one device buffer.
//! * [`ComputeBackend`]: the seam a concrete device implements.
//! * [`HostBackend`]: always-available backend running host work functions.
//! * `WgpuBackend` (feature `gpu`): runs a WGSL program on an adapter.
//!
//! ## Discipline
//! Arguments are bound once, before a kernel's first dispatch. Host and device
//! memory never synchronize implicitly; every transfer is an explicit
//! `upload`/`download` at a phase boundary.

pub mod array;
pub mod backend;
pub mod context;
pub mod host;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use array::DeviceArray;
pub use backend::{BufferDesc, BufferHandle, ComputeBackend, KernelId};
pub use context::ComputeContext;
pub use host::{HostBackend, HostKernelFn, HostProgram, KernelArgs};

#[cfg(feature = "gpu")]
pub use gpu::WgpuBackend;
