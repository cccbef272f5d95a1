//! Backend seam between the [`ComputeContext`](super::ComputeContext) and a
//! concrete device.
//!
//! The context owns every piece of bookkeeping (buffer arena, kernel registry,
//! argument tables, dispose ordering). A backend only moves bytes and runs
//! kernels; it never decides *whether* an operation is legal.

use std::fmt;

use crate::engine::error::ComputeResult;

/// Stable index of a device buffer inside the context's arena.
///
/// Handles are never reused: a released slot stays released for the lifetime
/// of the context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

impl BufferHandle {
    /// Arena index of this handle.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a compiled kernel, assigned in the order kernels were requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId(pub(crate) u32);

impl KernelId {
    /// Registry index of this kernel.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Allocation request passed to [`ComputeBackend::create_buffer`].
#[derive(Clone, Copy, Debug)]
pub struct BufferDesc<'a> {
    /// Arena handle the backend must associate with the allocation.
    pub handle: BufferHandle,

    /// Human-readable label for diagnostics.
    pub label: &'a str,

    /// Size in bytes of one element.
    pub element_size: usize,

    /// Initial contents; the allocation is exactly this many bytes.
    pub contents: &'a [u8],
}

/// A device that can hold buffers and run named kernels over a 1-D range.
///
/// ## Contract
/// * `compile` is called once, before any other call, with the full list of
///   kernel names; kernel `i` of that list is addressed as `KernelId(i)`.
/// * `dispatch` receives the complete, ordered argument list of the kernel.
///   Argument lists never change after a kernel's first dispatch.
/// * `write_buffer`/`read_buffer` are full-buffer synchronous copies.
/// * `finish` blocks until every submitted dispatch has completed.
/// * The `release_*` family is invoked by the context in dispose order:
///   buffers, kernels, program, queue, device.
pub trait ComputeBackend {
    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;

    /// Name of the selected device.
    fn device_name(&self) -> String;

    /// Compiles the program and creates one kernel object per name.
    fn compile(&mut self, kernels: &[&str]) -> ComputeResult<()>;

    /// Allocates a device buffer initialized from `desc.contents`.
    fn create_buffer(&mut self, desc: BufferDesc<'_>) -> ComputeResult<()>;

    /// Copies `bytes` over the whole device buffer.
    fn write_buffer(&mut self, handle: BufferHandle, bytes: &[u8]) -> ComputeResult<()>;

    /// Copies the whole device buffer into `out`.
    fn read_buffer(&mut self, handle: BufferHandle, out: &mut [u8]) -> ComputeResult<()>;

    /// Runs `kernel` over `work_size` independent work items.
    fn dispatch(
        &mut self,
        kernel: KernelId,
        args: &[BufferHandle],
        work_size: u32,
    ) -> ComputeResult<()>;

    /// Blocks until all outstanding work has completed.
    fn finish(&mut self) -> ComputeResult<()>;

    /// Frees one device buffer.
    fn release_buffer(&mut self, handle: BufferHandle);

    /// Frees every kernel object.
    fn release_kernels(&mut self);

    /// Frees the compiled program.
    fn release_program(&mut self);

    /// Frees the command queue.
    fn release_queue(&mut self);

    /// Frees the device and its context.
    fn release_device(&mut self);
}
