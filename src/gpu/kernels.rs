//! Compute pipelines for the operator kernels
//!
//! All kernels live in one WGSL module and share a single bind group
//! layout: params + three sampled inputs + one storage output. Slots a
//! kernel does not read are bound to a fallback texture and flagged off
//! in the params block.

use std::collections::HashMap;

/// The operator kernels available for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    UvGradient,
    Invert,
    Exposure,
    Mix,
}

impl Kernel {
    const ALL: [Kernel; 4] = [
        Kernel::UvGradient,
        Kernel::Invert,
        Kernel::Exposure,
        Kernel::Mix,
    ];

    pub(crate) fn entry_point(self) -> &'static str {
        match self {
            Kernel::UvGradient => "uv_gradient",
            Kernel::Invert => "invert",
            Kernel::Exposure => "exposure",
            Kernel::Mix => "mix_blend",
        }
    }
}

/// One input slot of a kernel dispatch.
///
/// `backup` is the constant consulted when `handle` is absent, i.e. the
/// documented fallback of an unconnected input pin. Scalar inputs use the
/// x channel of the constant.
#[derive(Debug, Clone, Copy)]
pub struct KernelInput {
    pub handle: Option<crate::gpu::TextureHandle>,
    pub backup: glam::Vec4,
}

impl KernelInput {
    pub fn new(handle: Option<crate::gpu::TextureHandle>, backup: glam::Vec4) -> Self {
        Self { handle, backup }
    }
}

/// Uniform params block shared by every kernel. Layout matches the WGSL
/// `Params` struct (80 bytes, 16-byte aligned).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct KernelParams {
    pub input_colors: [[f32; 4]; 3],
    pub input_flags: [u32; 4],
    pub resolution: [u32; 2],
    pub _padding: [u32; 2],
}

/// Shader module, bind group layout, and one pipeline per kernel.
pub(crate) struct KernelSet {
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<Kernel, wgpu::ComputePipeline>,
}

impl KernelSet {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("operator kernels"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/kernels.wgsl").into()),
        });

        let input_binding = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("kernel bindings"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                input_binding(1),
                input_binding(2),
                input_binding(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("kernel layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for kernel in Kernel::ALL {
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.entry_point()),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(kernel.entry_point()),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            pipelines.insert(kernel, pipeline);
        }

        Self {
            bind_group_layout,
            pipelines,
        }
    }

    pub(crate) fn pipeline(&self, kernel: Kernel) -> &wgpu::ComputePipeline {
        // All variants are inserted in `new`.
        &self.pipelines[&kernel]
    }
}
