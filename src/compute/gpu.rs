//! # wgpu Compute Backend
//!
//! Runs an external WGSL kernel program on the first high-performance adapter.
//!
//! ## Binding model
//!
//! Every kernel follows one fixed convention so that the host-side argument
//! tables map directly onto shader bindings:
//!
//! * `@group(0) @binding(i)`: argument `i`, a `read_write` storage buffer
//! * `@group(1) @binding(0)`: uniform `{ work_size, _p0, _p1, _p2 }`
//!
//! The shader declares `@workgroup_size(64)` and must bounds-check its global
//! invocation id against `work_size`.
//!
//! ## Memory
//!
//! Buffers are padded to a multiple of four bytes. Element types narrower than
//! four bytes are packed little-endian, so shaders unpack them from `u32` words.
//!
//! ## Pipelines
//!
//! The shader module is compiled once, eagerly, inside a validation error
//! scope so that compile failures surface as construction errors. Pipelines
//! and bind groups are created lazily on a kernel's first dispatch and cached:
//! the context rejects rebinding after a dispatch, so the cached bind group
//! stays valid for the kernel's lifetime.
//!
//! ## Synchronization
//!
//! `dispatch` submits without waiting. `finish`, uploads and downloads block via
//! `device.poll`.

#![cfg(feature = "gpu")]

use std::path::Path;
use std::sync::mpsc;

use tracing::{debug, info};

use crate::compute::backend::{BufferDesc, BufferHandle, ComputeBackend, KernelId};
use crate::engine::error::{BufferReleasedError, ComputeError, ComputeResult};

const WORKGROUP_SIZE: u32 = 64;

#[repr(C)]
#[allow(dead_code)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    work_size: u32,
    _p0: u32,
    _p1: u32,
    _p2: u32,
}

struct DeviceBuffer {
    buffer: wgpu::Buffer,
    padded: u64,
}

struct CachedKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params: wgpu::Buffer,
    params_group: wgpu::BindGroup,
}

struct WgpuKernel {
    name: String,
    cached: Option<CachedKernel>,
}

/// Whether the WGSL source declares a function called `name`.
fn declares_function(source: &str, name: &str) -> bool {
    source.match_indices("fn ").any(|(at, _)| {
        let rest = source[at + 3..].trim_start();
        rest.strip_prefix(name)
            .is_some_and(|tail| tail.trim_start().starts_with('('))
    })
}

#[inline]
fn padded_len(bytes: usize) -> u64 {
    (bytes.max(4).div_ceil(4) * 4) as u64
}

/// Device backend over `wgpu`.
pub struct WgpuBackend {
    adapter_name: String,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    source: String,
    module: Option<wgpu::ShaderModule>,
    params_layout: Option<wgpu::BindGroupLayout>,
    kernels: Vec<WgpuKernel>,
    buffers: Vec<Option<DeviceBuffer>>,
    last_submission: Option<wgpu::SubmissionIndex>,
}

impl WgpuBackend {
    /// Reads the WGSL program at `path` and opens a device.
    ///
    /// ## Errors
    /// * `ProgramSource` if the file cannot be read.
    /// * `NoDevice` if no adapter or device is available.
    pub fn from_file(path: &Path) -> ComputeResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| ComputeError::ProgramSource {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_source(source)
    }

    /// Opens a device for an in-memory WGSL program.
    pub fn from_source(source: String) -> ComputeResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| ComputeError::NoDevice { message: format!("no suitable adapter: {e}") })?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            device_type = ?adapter_info.device_type,
            api = ?adapter_info.backend,
            "wgpu adapter selected"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("creature_sim_device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .map_err(|e| ComputeError::NoDevice { message: format!("device request failed: {e}") })?;

        Ok(Self {
            adapter_name: adapter_info.name,
            device: Some(device),
            queue: Some(queue),
            source,
            module: None,
            params_layout: None,
            kernels: Vec::new(),
            buffers: Vec::new(),
            last_submission: None,
        })
    }

    fn device(&self) -> ComputeResult<&wgpu::Device> {
        self.device.as_ref().ok_or(ComputeError::Disposed)
    }

    fn queue(&self) -> ComputeResult<&wgpu::Queue> {
        self.queue.as_ref().ok_or(ComputeError::Disposed)
    }

    fn buffer(&self, handle: BufferHandle) -> ComputeResult<&DeviceBuffer> {
        self.buffers
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| BufferReleasedError { handle }.into())
    }

    fn wait(&self, submission: Option<wgpu::SubmissionIndex>) -> ComputeResult<()> {
        self.device()?
            .poll(wgpu::PollType::Wait {
                submission_index: submission,
                timeout: None,
            })
            .map(|_| ())
            .map_err(|e| ComputeError::Synchronization {
                message: format!("wgpu device poll failed: {e:?}"),
            })
    }

    /// Builds the pipeline and bind groups of one kernel for `args`.
    fn build_kernel(&self, name: &str, args: &[BufferHandle]) -> ComputeResult<CachedKernel> {
        let device = self.device()?;
        let module = self.module.as_ref().ok_or_else(|| ComputeError::ProgramCompile {
            message: String::from("program already released"),
        })?;
        let params_layout = self.params_layout.as_ref().ok_or(ComputeError::Disposed)?;

        let entries0: Vec<wgpu::BindGroupLayoutEntry> = (0..args.len())
            .map(|i| wgpu::BindGroupLayoutEntry {
                binding: i as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let args_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel_args_layout"),
            entries: &entries0,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel_pipeline_layout"),
            bind_group_layouts: &[&args_layout, params_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: Some(&layout),
            module,
            entry_point: Some(name),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let mut entries = Vec::with_capacity(args.len());
        for (i, &handle) in args.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32,
                resource: self.buffer(handle)?.buffer.as_entire_binding(),
            });
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_args"),
            layout: &args_layout,
            entries: &entries,
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("kernel_params"),
            size: std::mem::size_of::<Params>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kernel_params"),
            layout: params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params.as_entire_binding(),
            }],
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(ComputeError::ProgramCompile {
                message: format!("kernel `{name}`: {e}"),
            });
        }

        debug!(kernel = name, args = args.len(), "compute pipeline created");
        Ok(CachedKernel { pipeline, bind_group, params, params_group })
    }
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn device_name(&self) -> String {
        self.adapter_name.clone()
    }

    fn compile(&mut self, kernels: &[&str]) -> ComputeResult<()> {
        let missing: Vec<&str> = kernels
            .iter()
            .copied()
            .filter(|name| !declares_function(&self.source, name))
            .collect();
        if !missing.is_empty() {
            return Err(ComputeError::ProgramCompile {
                message: format!("program has no entry point(s): {}", missing.join(", ")),
            });
        }

        let device = self.device()?;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("creature_kernels"),
            source: wgpu::ShaderSource::Wgsl(self.source.as_str().into()),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(ComputeError::ProgramCompile { message: e.to_string() });
        }

        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel_params_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        self.module = Some(module);
        self.params_layout = Some(params_layout);
        self.kernels = kernels
            .iter()
            .map(|name| WgpuKernel { name: (*name).to_owned(), cached: None })
            .collect();
        Ok(())
    }

    fn create_buffer(&mut self, desc: BufferDesc<'_>) -> ComputeResult<()> {
        let device = self.device()?;
        let padded = padded_len(desc.contents.len());

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: padded,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..desc.contents.len()].copy_from_slice(desc.contents);
        buffer.unmap();

        let index = desc.handle.index();
        if self.buffers.len() <= index {
            self.buffers.resize_with(index + 1, || None);
        }
        self.buffers[index] = Some(DeviceBuffer { buffer, padded });
        Ok(())
    }

    fn write_buffer(&mut self, handle: BufferHandle, bytes: &[u8]) -> ComputeResult<()> {
        let target = self.buffer(handle)?;
        let mut staged = bytes.to_vec();
        staged.resize(target.padded as usize, 0);

        let queue = self.queue()?;
        queue.write_buffer(&target.buffer, 0, &staged);
        let submission = queue.submit(std::iter::empty());
        self.wait(Some(submission))
    }

    fn read_buffer(&mut self, handle: BufferHandle, out: &mut [u8]) -> ComputeResult<()> {
        let device = self.device()?;
        let source = self.buffer(handle)?;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: source.padded,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(&source.buffer, 0, &staging, 0, source.padded);
        let submission = self.queue()?.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.wait(Some(submission))?;

        receiver
            .recv()
            .map_err(|_| ComputeError::Synchronization {
                message: String::from("readback callback dropped"),
            })?
            .map_err(|e| ComputeError::Synchronization {
                message: format!("buffer map failed: {e}"),
            })?;

        out.copy_from_slice(&slice.get_mapped_range()[..out.len()]);
        staging.unmap();
        Ok(())
    }

    fn dispatch(
        &mut self,
        kernel: KernelId,
        args: &[BufferHandle],
        work_size: u32,
    ) -> ComputeResult<()> {
        let index = kernel.index();
        let needs_build = match self.kernels.get(index) {
            Some(k) => k.cached.is_none(),
            None => {
                return Err(ComputeError::ProgramCompile {
                    message: format!("kernel {index} is not compiled"),
                })
            }
        };
        if needs_build {
            let name = self.kernels[index].name.clone();
            let built = self.build_kernel(&name, args)?;
            self.kernels[index].cached = Some(built);
        }

        let cached = self.kernels[index].cached.as_ref().ok_or(ComputeError::Disposed)?;
        let queue = self.queue()?;
        let params = Params { work_size, _p0: 0, _p1: 0, _p2: 0 };
        queue.write_buffer(&cached.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = self.device()?.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("kernel_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("kernel_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&cached.pipeline);
            pass.set_bind_group(0, &cached.bind_group, &[]);
            pass.set_bind_group(1, &cached.params_group, &[]);
            pass.dispatch_workgroups(work_size.div_ceil(WORKGROUP_SIZE), 1, 1);
        }

        self.last_submission = Some(queue.submit(Some(encoder.finish())));
        Ok(())
    }

    fn finish(&mut self) -> ComputeResult<()> {
        if self.device.is_none() {
            return Ok(());
        }
        let submission = self.last_submission.take();
        self.wait(submission)
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if let Some(slot) = self.buffers.get_mut(handle.index()) {
            if let Some(released) = slot.take() {
                released.buffer.destroy();
            }
        }
    }

    fn release_kernels(&mut self) {
        self.kernels.clear();
        self.params_layout = None;
    }

    fn release_program(&mut self) {
        self.module = None;
    }

    fn release_queue(&mut self) {
        self.queue = None;
    }

    fn release_device(&mut self) {
        self.buffers.clear();
        if let Some(device) = self.device.take() {
            device.destroy();
        }
    }
}
