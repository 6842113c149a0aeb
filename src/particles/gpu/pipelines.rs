//! Bind group layouts and pipelines for the particle stages

use std::num::NonZeroU64;

use crate::gpu::buffer_layouts::{bindings, SortParams};

const COMPUTE_SHADER: &str = include_str!("../../shaders/compute/particle_stages.wgsl");
const BILLBOARD_SHADER: &str = include_str!("../../shaders/rendering/particle_billboard.wgsl");

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Scene depth read with `textureLoad` as plain floats, which the GL backend
/// supports where depth-typed loads are not
fn depth_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Layouts shared by the compute and render pipelines
pub struct ParticleLayouts {
    /// Slot pool, bound by every compute stage
    pub pool: wgpu::BindGroupLayout,
    pub emit: wgpu::BindGroupLayout,
    pub simulate: wgpu::BindGroupLayout,
    pub sort: wgpu::BindGroupLayout,
    /// Read-only pool views for the vertex stage
    pub render_data: wgpu::BindGroupLayout,
    /// Texture, sampler and scene depth supplied per frame
    pub render_views: wgpu::BindGroupLayout,
}

impl ParticleLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let compute = wgpu::ShaderStages::COMPUTE;

        let pool = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Pool Bind Group Layout"),
            entries: &[
                storage_entry(bindings::pool::PARTICLES_A, compute, false),
                storage_entry(bindings::pool::PARTICLES_B, compute, false),
                storage_entry(bindings::pool::FREE_LIST, compute, false),
                storage_entry(bindings::pool::ALIVE_LIST, compute, false),
                storage_entry(bindings::pool::VIEW_POSITIONS, compute, false),
                storage_entry(bindings::pool::COUNTERS, compute, false),
                storage_entry(bindings::pool::DRAW_ARGS, compute, false),
            ],
        });

        let emit = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Emit Bind Group Layout"),
            entries: &[
                uniform_entry(bindings::stage::EMITTER_UNIFORMS, compute),
                uniform_entry(bindings::stage::FREE_COUNT_SNAPSHOT, compute),
                wgpu::BindGroupLayoutEntry {
                    binding: bindings::stage::RANDOM_FIELD,
                    visibility: compute,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let simulate = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Simulate Bind Group Layout"),
            entries: &[
                uniform_entry(bindings::stage::SIMULATION_UNIFORMS, compute),
                depth_entry(bindings::stage::SCENE_DEPTH, compute),
            ],
        });

        let sort = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Sort Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: bindings::stage::SORT_PARAMS,
                visibility: compute,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<SortParams>() as u64),
                },
                count: None,
            }],
        });

        let vertex = wgpu::ShaderStages::VERTEX;
        let render_data = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Render Data Bind Group Layout"),
            entries: &[
                storage_entry(bindings::render::ALIVE_LIST, vertex, true),
                storage_entry(bindings::render::VIEW_POSITIONS, vertex, true),
                storage_entry(bindings::render::PARTICLES_A, vertex, true),
                uniform_entry(
                    bindings::render::RASTER_UNIFORMS,
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                ),
            ],
        });

        let fragment = wgpu::ShaderStages::FRAGMENT;
        let render_views = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Render Views Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: bindings::render::PARTICLE_TEXTURE,
                    visibility: fragment,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: bindings::render::PARTICLE_SAMPLER,
                    visibility: fragment,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                depth_entry(bindings::render::SCENE_DEPTH, fragment),
            ],
        });

        Self {
            pool,
            emit,
            simulate,
            sort,
            render_data,
            render_views,
        }
    }
}

/// Every compute pipeline, all built from one shader module
pub struct ComputePipelines {
    pub init_free_list: wgpu::ComputePipeline,
    pub reset_particles: wgpu::ComputePipeline,
    pub emit: wgpu::ComputePipeline,
    pub simulate: wgpu::ComputePipeline,
    pub finalize_draw_args: wgpu::ComputePipeline,
    pub sort_pad: wgpu::ComputePipeline,
    pub bitonic_step: wgpu::ComputePipeline,
}

impl ComputePipelines {
    pub fn new(device: &wgpu::Device, layouts: &ParticleLayouts) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(COMPUTE_SHADER.into()),
        });

        let pool_only = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Pool Pipeline Layout"),
            bind_group_layouts: &[&layouts.pool],
            push_constant_ranges: &[],
        });
        let with_stage = |stage: &wgpu::BindGroupLayout, label: &str| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&layouts.pool, stage],
                push_constant_ranges: &[],
            })
        };
        let emit_layout = with_stage(&layouts.emit, "Particle Emit Pipeline Layout");
        let simulate_layout = with_stage(&layouts.simulate, "Particle Simulate Pipeline Layout");
        let sort_layout = with_stage(&layouts.sort, "Particle Sort Pipeline Layout");

        let pipeline = |layout: &wgpu::PipelineLayout, entry_point: &str, label: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                module: &shader,
                entry_point,
            })
        };

        Self {
            init_free_list: pipeline(&pool_only, "init_free_list", "Init Free List Pipeline"),
            reset_particles: pipeline(&pool_only, "reset_particles", "Reset Particles Pipeline"),
            emit: pipeline(&emit_layout, "emit", "Emit Particles Pipeline"),
            simulate: pipeline(&simulate_layout, "simulate", "Simulate Particles Pipeline"),
            finalize_draw_args: pipeline(&pool_only, "finalize_draw_args", "Finalize Draw Args Pipeline"),
            sort_pad: pipeline(&pool_only, "sort_pad", "Sort Pad Pipeline"),
            bitonic_step: pipeline(&sort_layout, "bitonic_step", "Bitonic Sort Step Pipeline"),
        }
    }
}

/// Billboard pipelines, one per blend mode
pub struct RenderPipelines {
    pub alpha_blended: wgpu::RenderPipeline,
    pub additive: wgpu::RenderPipeline,
}

impl RenderPipelines {
    pub fn new(
        device: &wgpu::Device,
        layouts: &ParticleLayouts,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Billboard Shader"),
            source: wgpu::ShaderSource::Wgsl(BILLBOARD_SHADER.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Render Pipeline Layout"),
            bind_group_layouts: &[&layouts.render_data, &layouts.render_views],
            push_constant_ranges: &[],
        });

        let additive_blend = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Zero,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };

        let pipeline = |blend: wgpu::BlendState, label: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                // Scene depth is read in the fragment stage, not tested
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        Self {
            alpha_blended: pipeline(wgpu::BlendState::ALPHA_BLENDING, "Particle Alpha Blend Pipeline"),
            additive: pipeline(additive_blend, "Particle Additive Pipeline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_depth_bound_as_unfilterable_float() {
        let entry = depth_entry(bindings::stage::SCENE_DEPTH, wgpu::ShaderStages::COMPUTE);
        assert!(matches!(
            entry.ty,
            wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            }
        ));
    }

    #[test]
    fn test_compute_workgroup_size_matches_dispatch() {
        let attribute = format!(
            "@workgroup_size({})",
            crate::constants::dispatch::WORKGROUP_SIZE
        );
        assert_eq!(COMPUTE_SHADER.matches(&attribute).count(), 6);
    }

    #[test]
    fn test_shaders_avoid_depth_typed_textures() {
        for source in [COMPUTE_SHADER, BILLBOARD_SHADER] {
            assert!(!source.contains("texture_depth_2d"));
            assert!(source.contains("var scene_depth: texture_2d<f32>;"));
        }
    }
}
