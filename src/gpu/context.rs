//! Compute device bootstrap and submission plumbing
//!
//! Evaluation correctness relies on wgpu's single in-order submission
//! queue: work submitted for a producer node precedes work submitted for
//! its consumers because submission follows the topological order, and the
//! queue executes submissions in order. A backend with multiple
//! independent queues would need explicit fences between producer and
//! consumer submissions; this binding never creates one.

use std::sync::mpsc;
use std::sync::Arc;

use glam::UVec2;
use log::info;
use wgpu::util::DeviceExt;

use crate::error::EvalError;
use crate::gpu::kernels::{Kernel, KernelInput, KernelParams, KernelSet};
use crate::gpu::pool::TexturePool;
use crate::gpu::texture::TextureHandle;

const BYTES_PER_PIXEL: u32 = 16; // rgba32float

/// Owns the wgpu device/queue pair and the operator kernel pipelines.
pub struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    kernels: KernelSet,
    /// 1x1 texture bound to kernel input slots that carry a constant.
    fallback_view: wgpu::TextureView,
}

impl GpuContext {
    /// Acquire an adapter and device. Fails with [`EvalError::Gpu`] when no
    /// compatible adapter exists.
    pub fn new() -> Result<Self, EvalError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|error| EvalError::Gpu(format!("no compatible adapter: {error}")))?;

        info!("compute adapter: {:?}", adapter.get_info());

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("texflow device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            ..Default::default()
        }))
        .map_err(|error| EvalError::Gpu(format!("device creation failed: {error}")))?;

        let kernels = KernelSet::new(&device);

        let fallback = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("fallback input"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            kernels,
            fallback_view,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub(crate) fn device_arc(&self) -> Arc<wgpu::Device> {
        Arc::clone(&self.device)
    }

    /// Device-wide completion barrier: returns once every submitted
    /// kernel has finished executing.
    pub(crate) fn wait_idle(&self) -> Result<(), EvalError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|error| EvalError::Gpu(format!("device wait failed: {error}")))?;
        Ok(())
    }

    /// Enqueue one kernel over the full output texture.
    ///
    /// Input slots resolve in order: an image-backed handle binds its view,
    /// a uniform handle passes its constant, an absent handle passes the
    /// slot's backup value. Returns without blocking; the submission lands
    /// on the in-order queue.
    pub(crate) fn dispatch(
        &self,
        pool: &TexturePool,
        kernel: Kernel,
        inputs: &[KernelInput],
        out: TextureHandle,
    ) -> Result<(), EvalError> {
        let out_view = pool
            .device_view(out)
            .ok_or_else(|| EvalError::Gpu("kernel output must be an image texture".into()))?;
        let resolution = out.resolution();

        let mut colors = [[0.0f32; 4]; 3];
        let mut flags = [0u32; 4];
        let mut views = [&self.fallback_view; 3];
        for (slot, input) in inputs.iter().enumerate().take(3) {
            match input.handle {
                Some(handle) => match pool.device_view(handle) {
                    Some(view) => {
                        views[slot] = view;
                        flags[slot] = 1;
                    }
                    None => colors[slot] = pool.uniform(handle).to_array(),
                },
                None => colors[slot] = input.backup.to_array(),
            }
        }

        let params = KernelParams {
            input_colors: colors,
            input_flags: flags,
            resolution: resolution.to_array(),
            _padding: [0; 2],
        };
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kernel params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.entry_point()),
            layout: &self.kernels.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(out_view),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.entry_point()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(self.kernels.pipeline(kernel));
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(resolution.x.div_ceil(16), resolution.y.div_ceil(16), 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Copy a texture into host memory as tightly packed RGBA f32 rows.
    pub(crate) fn read_texture(
        &self,
        texture: &wgpu::Texture,
        resolution: UVec2,
    ) -> Result<Vec<f32>, EvalError> {
        let unpadded = resolution.x * BYTES_PER_PIXEL;
        let padded = unpadded.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size: u64::from(padded) * u64::from(resolution.y),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: resolution.x,
                height: resolution.y,
                depth_or_array_layers: 1,
            },
        );
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })
            .map_err(|error| EvalError::Gpu(format!("readback wait failed: {error}")))?;

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|error| EvalError::Gpu(format!("readback wait failed: {error}")))?;
        rx.recv()
            .map_err(|_| EvalError::Gpu("readback mapping callback dropped".into()))?
            .map_err(|error| EvalError::Gpu(format!("readback mapping failed: {error}")))?;

        let mut pixels = Vec::with_capacity((resolution.x * resolution.y * 4) as usize);
        {
            let data = slice.get_mapped_range();
            for row in 0..resolution.y {
                let start = (row * padded) as usize;
                let end = start + unpadded as usize;
                pixels.extend_from_slice(bytemuck::cast_slice(&data[start..end]));
            }
        }
        staging.unmap();
        Ok(pixels)
    }

    /// Upload tightly packed RGBA f32 rows into a texture and flush the
    /// write onto the queue.
    pub(crate) fn write_texture(&self, texture: &wgpu::Texture, resolution: UVec2, pixels: &[f32]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(resolution.x * BYTES_PER_PIXEL),
                rows_per_image: Some(resolution.y),
            },
            wgpu::Extent3d {
                width: resolution.x,
                height: resolution.y,
                depth_or_array_layers: 1,
            },
        );
        // Queued writes execute at the next submission.
        self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
    }
}
