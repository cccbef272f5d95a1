//! Compute Context
//!
//! A `ComputeContext` is the **explicitly owned** handle to one device session.
//! There is no process-wide device state: every component that touches device
//! memory receives the context by reference.
//!
//! ## Responsibilities
//! * Owns the backend (device, queue, compiled program).
//! * Owns the **buffer arena**: every device buffer is registered under a
//!   stable [`BufferHandle`]; released slots stay in a typed `Released` state.
//! * Owns the **kernel registry**: name → kernel, with each kernel's ordered
//!   argument table and dispatch counter.
//! * Enforces the binding discipline: arguments may only be bound before a
//!   kernel's first dispatch, and every argument must be bound by then.
//! * Disposes deterministically: buffers first, then kernels, program, queue
//!   and device.
//!
//! ## Synchronization
//! `dispatch` only enqueues. Callers that depend on a dispatch's output must
//! call [`ComputeContext::finish`] first. Transfers are synchronous.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::compute::backend::{BufferDesc, BufferHandle, ComputeBackend, KernelId};
use crate::compute::host::{HostBackend, HostProgram};
use crate::engine::error::{
    BufferReleasedError, ComputeError, ComputeResult, UnknownKernelError,
};

enum BufferSlot {
    Live { label: String, bytes: usize },
    Released,
}

/// Arena of device buffers keyed by stable handles.
#[derive(Default)]
struct BufferArena {
    slots: Vec<BufferSlot>,
}

impl BufferArena {
    fn register(&mut self, label: &str, bytes: usize) -> BufferHandle {
        let handle = BufferHandle(self.slots.len() as u32);
        self.slots.push(BufferSlot::Live { label: label.to_owned(), bytes });
        handle
    }

    fn live(&self, handle: BufferHandle) -> ComputeResult<(&str, usize)> {
        match self.slots.get(handle.index()) {
            Some(BufferSlot::Live { label, bytes }) => Ok((label.as_str(), *bytes)),
            _ => Err(BufferReleasedError { handle }.into()),
        }
    }

    fn mark_released(&mut self, handle: BufferHandle) -> ComputeResult<()> {
        match self.slots.get_mut(handle.index()) {
            Some(slot @ BufferSlot::Live { .. }) => {
                *slot = BufferSlot::Released;
                Ok(())
            }
            _ => Err(BufferReleasedError { handle }.into()),
        }
    }

    fn live_handles(&self) -> Vec<BufferHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, BufferSlot::Live { .. }))
            .map(|(index, _)| BufferHandle(index as u32))
            .collect()
    }

    fn live_bytes(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot {
                BufferSlot::Live { bytes, .. } => *bytes,
                BufferSlot::Released => 0,
            })
            .sum()
    }
}

struct KernelEntry {
    name: String,
    args: Vec<Option<BufferHandle>>,
    dispatches: u64,
}

/// Name → kernel registry with per-kernel argument tables.
#[derive(Default)]
struct KernelRegistry {
    entries: Vec<KernelEntry>,
    by_name: HashMap<String, KernelId>,
}

impl KernelRegistry {
    fn new(names: &[&str]) -> Self {
        let mut registry = Self::default();
        for (index, name) in names.iter().enumerate() {
            let id = KernelId(index as u32);
            registry.entries.push(KernelEntry {
                name: (*name).to_owned(),
                args: Vec::new(),
                dispatches: 0,
            });
            registry.by_name.insert((*name).to_owned(), id);
        }
        registry
    }

    fn lookup(&self, name: &str) -> ComputeResult<KernelId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| UnknownKernelError { name: name.to_owned() }.into())
    }

    fn entry_mut(&mut self, id: KernelId) -> &mut KernelEntry {
        &mut self.entries[id.index()]
    }
}

/// Owned device session: backend, buffer arena, and kernel registry.
pub struct ComputeContext {
    backend: Box<dyn ComputeBackend>,
    buffers: BufferArena,
    kernels: KernelRegistry,
    disposed: bool,
}

impl ComputeContext {
    /// Compiles `kernels` on `backend` and returns a ready context.
    ///
    /// ## Errors
    /// Fails if the program does not compile or lacks any requested kernel.
    /// No context is returned in that case.
    pub fn new(mut backend: Box<dyn ComputeBackend>, kernels: &[&str]) -> ComputeResult<Self> {
        info!(
            backend = backend.name(),
            device = %backend.device_name(),
            "selected compute device"
        );
        backend.compile(kernels)?;
        debug!(kernels = kernels.len(), "kernel program compiled");

        Ok(Self {
            backend,
            buffers: BufferArena::default(),
            kernels: KernelRegistry::new(kernels),
            disposed: false,
        })
    }

    /// Creates a context running `program` on the host backend.
    pub fn host(program: HostProgram, kernels: &[&str]) -> ComputeResult<Self> {
        Self::new(Box::new(HostBackend::new(program)), kernels)
    }

    /// Creates a context running the WGSL program at `path` on the first
    /// high-performance adapter.
    #[cfg(feature = "gpu")]
    pub fn wgpu(path: &std::path::Path, kernels: &[&str]) -> ComputeResult<Self> {
        let backend = crate::compute::gpu::WgpuBackend::from_file(path)?;
        Self::new(Box::new(backend), kernels)
    }

    /// Backend name, for logs.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Allocates a device buffer initialized from `contents` and registers it.
    pub fn create_buffer(
        &mut self,
        label: &str,
        element_size: usize,
        contents: &[u8],
    ) -> ComputeResult<BufferHandle> {
        self.ensure_live()?;
        let handle = self.buffers.register(label, contents.len());
        if let Err(e) = self.backend.create_buffer(BufferDesc {
            handle,
            label,
            element_size,
            contents,
        }) {
            self.buffers.mark_released(handle)?;
            return Err(e);
        }
        Ok(handle)
    }

    /// Copies `bytes` from the host over the whole device buffer.
    pub fn write(&mut self, handle: BufferHandle, bytes: &[u8]) -> ComputeResult<()> {
        self.ensure_live()?;
        self.check_size(handle, bytes.len())?;
        self.backend.write_buffer(handle, bytes)
    }

    /// Copies the whole device buffer into `out`.
    pub fn read(&mut self, handle: BufferHandle, out: &mut [u8]) -> ComputeResult<()> {
        self.ensure_live()?;
        self.check_size(handle, out.len())?;
        self.backend.read_buffer(handle, out)
    }

    /// Registers `handle` as argument `arg` of `kernel`.
    ///
    /// ## Errors
    /// * `UnknownKernel` if the program has no such kernel.
    /// * `BindAfterDispatch` once the kernel has been dispatched.
    /// * `BufferReleased` if the handle was released.
    pub fn bind(&mut self, kernel: &str, arg: u32, handle: BufferHandle) -> ComputeResult<()> {
        self.ensure_live()?;
        self.buffers.live(handle)?;
        let id = self.kernels.lookup(kernel)?;
        let entry = self.kernels.entry_mut(id);
        if entry.dispatches > 0 {
            return Err(ComputeError::BindAfterDispatch {
                kernel: entry.name.clone(),
                arg,
            });
        }

        let slot = arg as usize;
        if entry.args.len() <= slot {
            entry.args.resize(slot + 1, None);
        }
        entry.args[slot] = Some(handle);
        Ok(())
    }

    /// Enqueues `kernel` over `work_size` work items.
    ///
    /// ## Errors
    /// * `UnknownKernel` if the name is not registered.
    /// * `UnboundArgument` if any argument slot below the highest bound one is
    ///   empty.
    /// * `BufferReleased` if a bound buffer was released.
    pub fn dispatch(&mut self, kernel: &str, work_size: u32) -> ComputeResult<()> {
        self.ensure_live()?;
        let id = self.kernels.lookup(kernel)?;

        let entry = &self.kernels.entries[id.index()];
        let mut args = Vec::with_capacity(entry.args.len());
        for (index, slot) in entry.args.iter().enumerate() {
            let handle = slot.ok_or_else(|| ComputeError::UnboundArgument {
                kernel: entry.name.clone(),
                arg: index as u32,
            })?;
            self.buffers.live(handle)?;
            args.push(handle);
        }

        self.backend.dispatch(id, &args, work_size)?;
        self.kernels.entry_mut(id).dispatches += 1;
        Ok(())
    }

    /// Blocks until every enqueued dispatch has completed.
    pub fn finish(&mut self) -> ComputeResult<()> {
        self.ensure_live()?;
        self.backend.finish()
    }

    /// Releases one buffer. Releasing an already released handle is an error.
    pub fn release(&mut self, handle: BufferHandle) -> ComputeResult<()> {
        self.ensure_live()?;
        self.buffers.mark_released(handle)?;
        self.backend.release_buffer(handle);
        Ok(())
    }

    /// Number of times `kernel` has been dispatched.
    pub fn dispatch_count(&self, kernel: &str) -> ComputeResult<u64> {
        let id = self.kernels.lookup(kernel)?;
        Ok(self.kernels.entries[id.index()].dispatches)
    }

    /// Number of buffers currently holding device memory.
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.live_handles().len()
    }

    /// Total bytes of device memory held by live buffers.
    pub fn live_bytes(&self) -> usize {
        self.buffers.live_bytes()
    }

    /// Whether [`ComputeContext::dispose_all`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Waits for outstanding work, then releases every tracked buffer,
    /// the kernels, the program, the queue and the device, in that order.
    ///
    /// Buffers go first because they may still be bound to kernels.
    pub fn dispose_all(&mut self) -> ComputeResult<()> {
        self.ensure_live()?;
        let waited = self.backend.finish();

        let handles = self.buffers.live_handles();
        for &handle in &handles {
            self.buffers.mark_released(handle)?;
            self.backend.release_buffer(handle);
        }
        self.backend.release_kernels();
        self.backend.release_program();
        self.backend.release_queue();
        self.backend.release_device();
        self.disposed = true;

        info!(buffers = handles.len(), "compute context disposed");
        waited
    }

    fn ensure_live(&self) -> ComputeResult<()> {
        if self.disposed { Err(ComputeError::Disposed) } else { Ok(()) }
    }

    fn check_size(&self, handle: BufferHandle, actual: usize) -> ComputeResult<()> {
        let (label, expected) = self.buffers.live(handle)?;
        if expected != actual {
            return Err(ComputeError::SizeMismatch {
                label: label.to_owned(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ComputeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeContext")
            .field("backend", &self.backend.name())
            .field("kernels", &self.kernels.entries.len())
            .field("live_buffers", &self.live_buffer_count())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Drop for ComputeContext {
    fn drop(&mut self) {
        if !self.disposed {
            warn!("compute context dropped without dispose; releasing device resources");
            if let Err(e) = self.dispose_all() {
                warn!(error = %e, "dispose during drop failed");
            }
        }
    }
}
