//! Host compute backend.
//!
//! Runs a [`HostProgram`] (a table of named Rust work functions) against
//! buffers kept in host memory. It honors exactly the same contract as a device
//! backend: kernels only see their bound arguments, in bound order, and every
//! dispatch runs to completion before `dispatch` returns (so `finish` is a
//! no-op barrier).
//!
//! ## Argument access
//!
//! A work function receives [`KernelArgs`] and borrows each argument as a
//! typed slice. Borrows are checked at runtime: reading an argument with the
//! wrong element width, or taking two mutable borrows of the same argument,
//! yields `ArgumentMismatch` instead of aliasing memory.
//!
//! Device memory is stored as 4-byte words so that every element type the
//! contract allows is correctly aligned when viewed through `bytemuck`.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::mem::size_of;

use bytemuck::Pod;
use tracing::debug;

use crate::compute::backend::{BufferDesc, BufferHandle, ComputeBackend, KernelId};
use crate::engine::error::{ComputeError, ComputeResult};

/// Signature of a host work function.
pub type HostKernelFn = fn(&KernelArgs<'_>) -> ComputeResult<()>;

/// A named set of host work functions standing in for a compiled program.
#[derive(Clone)]
pub struct HostProgram {
    name: &'static str,
    entries: HashMap<&'static str, HostKernelFn>,
}

impl HostProgram {
    /// Creates an empty program.
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: HashMap::new() }
    }

    /// Adds (or replaces) an entry point.
    pub fn with_kernel(mut self, name: &'static str, f: HostKernelFn) -> Self {
        self.entries.insert(name, f);
        self
    }

    /// Program name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn entry(&self, name: &str) -> Option<HostKernelFn> {
        self.entries.get(name).copied()
    }
}

/// Device memory of one host buffer.
#[derive(Debug)]
pub struct HostMemory {
    words: Vec<u32>,
    len: usize,
    element_size: usize,
}

impl HostMemory {
    fn new(element_size: usize, contents: &[u8]) -> Self {
        let mut words = vec![0u32; contents.len().div_ceil(4)];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..contents.len()].copy_from_slice(contents);
        Self {
            words,
            len: contents.len() / element_size.max(1),
            element_size,
        }
    }

    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice::<u32, u8>(&self.words)[..self.len * self.element_size]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let n = self.len * self.element_size;
        &mut bytemuck::cast_slice_mut::<u32, u8>(&mut self.words)[..n]
    }
}

/// Bound arguments of one host dispatch.
pub struct KernelArgs<'a> {
    kernel: &'a str,
    work_size: u32,
    slots: Vec<&'a RefCell<HostMemory>>,
}

impl<'a> KernelArgs<'a> {
    /// Number of work items requested by the dispatch.
    #[inline]
    pub fn work_size(&self) -> usize {
        self.work_size as usize
    }

    /// Kernel name.
    #[inline]
    pub fn kernel(&self) -> &str {
        self.kernel
    }

    /// Borrows argument `arg` as a shared slice of `T`.
    pub fn read<T: Pod>(&self, arg: usize) -> ComputeResult<Ref<'a, [T]>> {
        let cell = self.slot(arg)?;
        let memory = cell
            .try_borrow()
            .map_err(|_| self.mismatch(arg, "argument is already borrowed mutably"))?;
        self.check_width::<T>(arg, &memory)?;
        Ok(Ref::map(memory, |m| &bytemuck::cast_slice::<u32, T>(&m.words)[..m.len]))
    }

    /// Borrows argument `arg` as an exclusive slice of `T`.
    pub fn write<T: Pod>(&self, arg: usize) -> ComputeResult<RefMut<'a, [T]>> {
        let cell = self.slot(arg)?;
        let memory = cell
            .try_borrow_mut()
            .map_err(|_| self.mismatch(arg, "argument is already borrowed"))?;
        self.check_width::<T>(arg, &memory)?;
        Ok(RefMut::map(memory, |m| {
            let len = m.len;
            &mut bytemuck::cast_slice_mut::<u32, T>(&mut m.words)[..len]
        }))
    }

    /// Builds a `KernelFault` for corrupt data found by this kernel.
    pub fn fault(&self, message: impl Into<String>) -> ComputeError {
        ComputeError::KernelFault {
            kernel: self.kernel.to_owned(),
            message: message.into(),
        }
    }

    fn slot(&self, arg: usize) -> ComputeResult<&'a RefCell<HostMemory>> {
        self.slots.get(arg).copied().ok_or_else(|| ComputeError::UnboundArgument {
            kernel: self.kernel.to_owned(),
            arg: arg as u32,
        })
    }

    fn check_width<T: Pod>(&self, arg: usize, memory: &HostMemory) -> ComputeResult<()> {
        if memory.element_size != size_of::<T>() {
            return Err(self.mismatch(
                arg,
                &format!(
                    "read as {}-byte elements, buffer holds {}-byte elements",
                    size_of::<T>(),
                    memory.element_size
                ),
            ));
        }
        Ok(())
    }

    fn mismatch(&self, arg: usize, detail: &str) -> ComputeError {
        ComputeError::ArgumentMismatch {
            kernel: self.kernel.to_owned(),
            arg: arg as u32,
            detail: detail.to_owned(),
        }
    }
}

struct HostKernel {
    name: String,
    entry: HostKernelFn,
}

/// Backend executing a [`HostProgram`] on the calling thread (and rayon).
pub struct HostBackend {
    program: Option<HostProgram>,
    kernels: Vec<Option<HostKernel>>,
    buffers: Vec<Option<RefCell<HostMemory>>>,
}

impl HostBackend {
    /// Creates a backend for `program`. Nothing is resolved until `compile`.
    pub fn new(program: HostProgram) -> Self {
        Self {
            program: Some(program),
            kernels: Vec::new(),
            buffers: Vec::new(),
        }
    }

    fn buffer(&self, handle: BufferHandle) -> ComputeResult<&RefCell<HostMemory>> {
        self.buffers
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| crate::engine::error::BufferReleasedError { handle }.into())
    }
}

impl ComputeBackend for HostBackend {
    fn name(&self) -> &'static str {
        "host"
    }

    fn device_name(&self) -> String {
        format!("host ({} threads)", rayon::current_num_threads())
    }

    fn compile(&mut self, kernels: &[&str]) -> ComputeResult<()> {
        let program = self.program.as_ref().ok_or_else(|| ComputeError::ProgramCompile {
            message: String::from("program already released"),
        })?;

        let mut missing = Vec::new();
        let mut resolved = Vec::with_capacity(kernels.len());
        for &name in kernels {
            match program.entry(name) {
                Some(entry) => resolved.push(Some(HostKernel { name: name.to_owned(), entry })),
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(ComputeError::ProgramCompile {
                message: format!(
                    "program `{}` has no entry point(s): {}",
                    program.name(),
                    missing.join(", ")
                ),
            });
        }

        debug!(program = program.name(), kernels = resolved.len(), "host kernels resolved");
        self.kernels = resolved;
        Ok(())
    }

    fn create_buffer(&mut self, desc: BufferDesc<'_>) -> ComputeResult<()> {
        let index = desc.handle.index();
        if self.buffers.len() <= index {
            self.buffers.resize_with(index + 1, || None);
        }
        self.buffers[index] = Some(RefCell::new(HostMemory::new(desc.element_size, desc.contents)));
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, bytes: &[u8]) -> ComputeResult<()> {
        let cell = self.buffer(handle)?;
        cell.borrow_mut().bytes_mut().copy_from_slice(bytes);
        Ok(())
    }

    fn read_buffer(&mut self, handle: BufferHandle, out: &mut [u8]) -> ComputeResult<()> {
        let cell = self.buffer(handle)?;
        out.copy_from_slice(cell.borrow().bytes());
        Ok(())
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        args: &[BufferHandle],
        work_size: u32,
    ) -> ComputeResult<()> {
        let host_kernel = self
            .kernels
            .get(kernel.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| ComputeError::ProgramCompile {
                message: format!("kernel {} is not compiled", kernel.index()),
            })?;

        let mut slots = Vec::with_capacity(args.len());
        for &handle in args {
            slots.push(self.buffer(handle)?);
        }

        let kernel_args = KernelArgs {
            kernel: &host_kernel.name,
            work_size,
            slots,
        };
        (host_kernel.entry)(&kernel_args)
    }

    fn finish(&mut self) -> ComputeResult<()> {
        Ok(())
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if let Some(slot) = self.buffers.get_mut(handle.index()) {
            *slot = None;
        }
    }

    fn release_kernels(&mut self) {
        self.kernels.clear();
    }

    fn release_program(&mut self) {
        self.program = None;
    }

    fn release_queue(&mut self) {}

    fn release_device(&mut self) {
        self.buffers.clear();
    }
}
