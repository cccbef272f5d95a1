//! Host/device mirrored typed arrays.
//!
//! A [`DeviceArray<T>`] owns a host vector and the handle of a device buffer of
//! the same length. Nothing moves between the two implicitly: callers decide
//! when to [`upload`](DeviceArray::upload) and when to
//! [`download`](DeviceArray::download), which keeps every transfer visible at
//! the phase boundaries of the simulator.
//!
//! Elements must be plain-old-data (`bytemuck::Pod`) with an alignment of at
//! most four bytes, which covers every type the kernel contract uses
//! (`u8`, `i8`, `i16`, `i32`, `u32`, `f32`).

use std::mem::{align_of, size_of};

use bytemuck::Pod;

use crate::compute::backend::BufferHandle;
use crate::compute::context::ComputeContext;
use crate::engine::error::{ComputeError, ComputeResult};

/// Typed buffer mirrored between host memory and device memory.
#[derive(Debug)]
pub struct DeviceArray<T: Pod> {
    host: Vec<T>,
    handle: BufferHandle,
    label: &'static str,
}

impl<T: Pod> DeviceArray<T> {
    /// Allocates a device buffer sized and initialized from `host`, registering
    /// it with `ctx` for bulk disposal.
    pub fn new(ctx: &mut ComputeContext, label: &'static str, host: Vec<T>) -> ComputeResult<Self> {
        let size = size_of::<T>();
        if size == 0 || align_of::<T>() > 4 || 4 % size != 0 {
            return Err(ComputeError::ArgumentMismatch {
                kernel: String::from("<allocation>"),
                arg: 0,
                detail: format!(
                    "element type of `{label}` must be 1, 2 or 4 bytes wide"
                ),
            });
        }
        let handle = ctx.create_buffer(label, size, bytemuck::cast_slice(&host))?;
        Ok(Self { host, handle, label })
    }

    /// Allocates a zero-filled array of `len` elements.
    pub fn zeroed(ctx: &mut ComputeContext, label: &'static str, len: usize) -> ComputeResult<Self> {
        Self::new(ctx, label, vec![<T as bytemuck::Zeroable>::zeroed(); len])
    }

    /// Registers this buffer as argument `arg` of `kernel`.
    pub fn bind(&self, ctx: &mut ComputeContext, kernel: &str, arg: u32) -> ComputeResult<()> {
        ctx.bind(kernel, arg, self.handle)
    }

    /// Copies the host contents over the device buffer.
    pub fn upload(&self, ctx: &mut ComputeContext) -> ComputeResult<()> {
        ctx.write(self.handle, bytemuck::cast_slice(&self.host))
    }

    /// Replaces the host contents with the device buffer.
    pub fn download(&mut self, ctx: &mut ComputeContext) -> ComputeResult<()> {
        ctx.read(self.handle, bytemuck::cast_slice_mut(&mut self.host))
    }

    /// Frees the device buffer. The host vector stays readable.
    pub fn release(&self, ctx: &mut ComputeContext) -> ComputeResult<()> {
        ctx.release(self.handle)
    }

    /// Host-side contents.
    #[inline]
    pub fn host(&self) -> &[T] {
        &self.host
    }

    /// Mutable host-side contents. Changes reach the device only on `upload`.
    #[inline]
    pub fn host_mut(&mut self) -> &mut [T] {
        &mut self.host
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.host.len()
    }

    /// Whether the array has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    /// Arena handle of the device buffer.
    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    /// Diagnostic label.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }
}
