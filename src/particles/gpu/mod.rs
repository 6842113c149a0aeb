//! Device implementation of the particle stages on wgpu
//!
//! Stages are recorded into one command encoder per frame, each in its own
//! pass, and submitted together by `flush`. Pass boundaries are what make
//! every stage see the writes of the one before it.

pub mod pipelines;
pub mod resources;

use std::num::NonZeroU64;

use crate::config::ParticleConfig;
use crate::constants::{dispatch::workgroups_for, sort};
use crate::error::EngineResult;
use crate::gpu::buffer_layouts::{
    bindings, groups, DrawIndexedIndirectArgs, EmitterUniforms, IndexBufferElement, ParticleA,
    ParticleB, ParticleCounters, RasterUniforms, SimulationUniforms, SortParams,
    ViewSpacePositionRadius,
};
use crate::gpu::error::{validated, GpuErrorContext};
use crate::gpu::GpuContext;
use crate::particles::random_field::RandomField;
use crate::particles::stages::{ParticleStages, Stage};

use pipelines::{ComputePipelines, ParticleLayouts, RenderPipelines};
use resources::PoolBuffers;

pub use resources::{create_particle_texture, default_particle_image, load_particle_image};

/// Views the rendering layer supplies every frame
pub struct GpuViews<'a> {
    /// Colour target the quads are blended into, loaded not cleared
    pub color_target: &'a wgpu::TextureView,
    /// Single-sample scene depth, read for collisions and soft particles
    pub scene_depth: &'a wgpu::TextureView,
    pub particle_texture: &'a wgpu::TextureView,
}

/// One emitter's slot pool and pipelines on the GPU
pub struct GpuParticlePool {
    context: GpuContext,
    capacity: u32,
    buffers: PoolBuffers,
    layouts: ParticleLayouts,
    compute: ComputePipelines,
    render: RenderPipelines,
    sampler: wgpu::Sampler,
    _random_field_texture: wgpu::Texture,

    pool_bind_group: wgpu::BindGroup,
    emit_bind_group: wgpu::BindGroup,
    sort_bind_group: wgpu::BindGroup,
    render_data_bind_group: wgpu::BindGroup,

    encoder: Option<wgpu::CommandEncoder>,
}

impl GpuParticlePool {
    /// Create every buffer, texture and pipeline of a pool.
    ///
    /// Contents are undefined until the reset protocol has run; wrap the
    /// pool in a `ParticleSystem` to get that done.
    pub fn new(context: &GpuContext, config: &ParticleConfig) -> EngineResult<Self> {
        config.validate()?;
        let device = &context.device;
        let capacity = config.pool.capacity;
        resources::check_device_limits(capacity, &device.limits())?;

        log::info!(
            "[GpuParticlePool] Creating pool with {} slots ({:.1} MB)",
            capacity,
            Self::memory_estimate(capacity) as f64 / (1024.0 * 1024.0)
        );

        let (buffers, layouts, compute, render) = validated(device, "create particle pipelines", || {
            let buffers = PoolBuffers::new(device, capacity);
            let layouts = ParticleLayouts::new(device);
            let compute = ComputePipelines::new(device, &layouts);
            let render = RenderPipelines::new(device, &layouts, config.render.color_format.to_wgpu());
            (buffers, layouts, compute, render)
        })?;

        let field = RandomField::generate(config.pool.random_field_size, config.pool.random_seed);
        let (random_field_texture, random_field_view) = validated(device, "create random field", || {
            resources::create_random_field_texture(device, &context.queue, &field)
        })?;

        let (sampler, pool_bind_group, emit_bind_group, sort_bind_group, render_data_bind_group) =
            validated(device, "create particle bind groups", || {
                let sampler = resources::create_particle_sampler(device);

                let pool_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Particle Pool Bind Group"),
                    layout: &layouts.pool,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::PARTICLES_A,
                            resource: buffers.particles_a.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::PARTICLES_B,
                            resource: buffers.particles_b.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::FREE_LIST,
                            resource: buffers.free_list.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::ALIVE_LIST,
                            resource: buffers.alive_list.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::VIEW_POSITIONS,
                            resource: buffers.view_positions.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::COUNTERS,
                            resource: buffers.counters.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::pool::DRAW_ARGS,
                            resource: buffers.draw_args.as_entire_binding(),
                        },
                    ],
                });

                let emit_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Particle Emit Bind Group"),
                    layout: &layouts.emit,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: bindings::stage::EMITTER_UNIFORMS,
                            resource: buffers.emitter_uniforms.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::stage::FREE_COUNT_SNAPSHOT,
                            resource: buffers.free_count_snapshot.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::stage::RANDOM_FIELD,
                            resource: wgpu::BindingResource::TextureView(&random_field_view),
                        },
                    ],
                });

                let sort_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Particle Sort Bind Group"),
                    layout: &layouts.sort,
                    entries: &[wgpu::BindGroupEntry {
                        binding: bindings::stage::SORT_PARAMS,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffers.sort_params,
                            offset: 0,
                            size: NonZeroU64::new(std::mem::size_of::<SortParams>() as u64),
                        }),
                    }],
                });

                let render_data_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Particle Render Data Bind Group"),
                    layout: &layouts.render_data,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: bindings::render::ALIVE_LIST,
                            resource: buffers.alive_list.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::render::VIEW_POSITIONS,
                            resource: buffers.view_positions.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::render::PARTICLES_A,
                            resource: buffers.particles_a.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: bindings::render::RASTER_UNIFORMS,
                            resource: buffers.raster_uniforms.as_entire_binding(),
                        },
                    ],
                });

                (sampler, pool_bind_group, emit_bind_group, sort_bind_group, render_data_bind_group)
            })?;

        Ok(Self {
            context: context.clone(),
            capacity,
            buffers,
            layouts,
            compute,
            render,
            sampler,
            _random_field_texture: random_field_texture,
            pool_bind_group,
            emit_bind_group,
            sort_bind_group,
            render_data_bind_group,
            encoder: None,
        })
    }

    /// Bytes of device memory held by a pool of `capacity` slots
    pub fn memory_estimate(capacity: u32) -> u64 {
        let slots = capacity as u64;
        let per_slot = std::mem::size_of::<ParticleA>()
            + std::mem::size_of::<ParticleB>()
            + std::mem::size_of::<ViewSpacePositionRadius>()
            + std::mem::size_of::<u32>();
        let alive = capacity.next_power_of_two() as u64
            * std::mem::size_of::<IndexBufferElement>() as u64;
        slots * per_slot as u64 + alive
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Buffer holding the five indirect draw words, for renderers that
    /// record their own draws
    pub fn draw_args_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.draw_args
    }

    /// Submit pending work and read both counters back. Stalls the GPU.
    pub fn read_counters(&mut self) -> EngineResult<ParticleCounters> {
        self.flush();
        let bytes = self.context.read_buffer(
            &self.buffers.counters,
            0,
            std::mem::size_of::<ParticleCounters>() as u64,
            "particle counters",
        )?;
        bytemuck::try_pod_read_unaligned::<ParticleCounters>(&bytes)
            .gpu_context("decode particle counters")
    }

    /// Submit pending work and read the indirect draw arguments back
    pub fn read_draw_args(&mut self) -> EngineResult<DrawIndexedIndirectArgs> {
        self.flush();
        let bytes = self.context.read_buffer(
            &self.buffers.draw_args,
            0,
            std::mem::size_of::<DrawIndexedIndirectArgs>() as u64,
            "particle draw args",
        )?;
        bytemuck::try_pod_read_unaligned::<DrawIndexedIndirectArgs>(&bytes)
            .gpu_context("decode particle draw args")
    }
}

/// The frame's encoder, created on first use
fn encoder_for<'a>(
    encoder: &'a mut Option<wgpu::CommandEncoder>,
    context: &GpuContext,
) -> &'a mut wgpu::CommandEncoder {
    encoder.get_or_insert_with(|| {
        context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Frame Encoder"),
            })
    })
}

/// Record one compute pass over `lanes` invocations with the pool bound
fn record_dispatch(
    encoder: &mut wgpu::CommandEncoder,
    stage: Stage,
    pipeline: &wgpu::ComputePipeline,
    pool_bind_group: &wgpu::BindGroup,
    stage_bind_group: Option<&wgpu::BindGroup>,
    lanes: u32,
) {
    if lanes == 0 {
        return;
    }
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(stage.label()),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(groups::POOL_GROUP, pool_bind_group, &[]);
    if let Some(group) = stage_bind_group {
        pass.set_bind_group(groups::STAGE_GROUP, group, &[]);
    }
    pass.dispatch_workgroups(workgroups_for(lanes), 1, 1);
}

impl ParticleStages for GpuParticlePool {
    type Views<'a> = GpuViews<'a>;

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn init_free_list(&mut self) {
        let encoder = encoder_for(&mut self.encoder, &self.context);
        record_dispatch(
            encoder,
            Stage::InitFreeList,
            &self.compute.init_free_list,
            &self.pool_bind_group,
            None,
            self.capacity,
        );
    }

    fn reset_particles(&mut self) {
        let encoder = encoder_for(&mut self.encoder, &self.context);
        record_dispatch(
            encoder,
            Stage::ResetParticles,
            &self.compute.reset_particles,
            &self.pool_bind_group,
            None,
            self.capacity,
        );
    }

    fn emit(&mut self, uniforms: &EmitterUniforms) {
        self.context.queue.write_buffer(
            &self.buffers.emitter_uniforms,
            0,
            bytemuck::bytes_of(uniforms),
        );

        let encoder = encoder_for(&mut self.encoder, &self.context);
        // Free stack count as it stands when Emit begins
        encoder.copy_buffer_to_buffer(
            &self.buffers.counters,
            0,
            &self.buffers.free_count_snapshot,
            0,
            std::mem::size_of::<u32>() as u64,
        );

        // Lanes past capacity could never find a free slot
        let lanes = uniforms.max_particles_this_frame.min(self.capacity);
        record_dispatch(
            encoder,
            Stage::Emit,
            &self.compute.emit,
            &self.pool_bind_group,
            Some(&self.emit_bind_group),
            lanes,
        );
    }

    fn simulate(&mut self, uniforms: &SimulationUniforms, views: &GpuViews<'_>) {
        self.context.queue.write_buffer(
            &self.buffers.simulation_uniforms,
            0,
            bytemuck::bytes_of(uniforms),
        );

        let simulate_bind_group = self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Simulate Bind Group"),
            layout: &self.layouts.simulate,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::stage::SIMULATION_UNIFORMS,
                    resource: self.buffers.simulation_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::stage::SCENE_DEPTH,
                    resource: wgpu::BindingResource::TextureView(views.scene_depth),
                },
            ],
        });

        let encoder = encoder_for(&mut self.encoder, &self.context);
        // Only the alive half of the counters starts over each frame
        encoder.clear_buffer(
            &self.buffers.counters,
            ParticleCounters::ALIVE_COUNT_OFFSET,
            Some(std::mem::size_of::<u32>() as u64),
        );
        record_dispatch(
            encoder,
            Stage::Simulate,
            &self.compute.simulate,
            &self.pool_bind_group,
            Some(&simulate_bind_group),
            self.capacity,
        );
        record_dispatch(
            encoder,
            Stage::Simulate,
            &self.compute.finalize_draw_args,
            &self.pool_bind_group,
            None,
            1,
        );
    }

    fn sort_alive(&mut self) {
        let sort_length = self.buffers.sort_length;
        let sort_steps = self.buffers.sort_steps;
        let encoder = encoder_for(&mut self.encoder, &self.context);
        record_dispatch(
            encoder,
            Stage::Sort,
            &self.compute.sort_pad,
            &self.pool_bind_group,
            None,
            sort_length,
        );

        // One pass per step; each step reads the previous step's swaps
        for step in 0..sort_steps {
            let offset = (step as u64 * sort::PARAMS_STRIDE) as u32;
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Bitonic Sort Step"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.compute.bitonic_step);
            pass.set_bind_group(groups::POOL_GROUP, &self.pool_bind_group, &[]);
            pass.set_bind_group(groups::STAGE_GROUP, &self.sort_bind_group, &[offset]);
            pass.dispatch_workgroups(workgroups_for(sort_length), 1, 1);
        }
    }

    fn rasterize(&mut self, uniforms: &RasterUniforms, views: &GpuViews<'_>) {
        self.context.queue.write_buffer(
            &self.buffers.raster_uniforms,
            0,
            bytemuck::bytes_of(uniforms),
        );

        let views_bind_group = self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Render Views Bind Group"),
            layout: &self.layouts.render_views,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: bindings::render::PARTICLE_TEXTURE,
                    resource: wgpu::BindingResource::TextureView(views.particle_texture),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::render::PARTICLE_SAMPLER,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: bindings::render::SCENE_DEPTH,
                    resource: wgpu::BindingResource::TextureView(views.scene_depth),
                },
            ],
        });

        let pipeline = if uniforms.alpha_blended != 0 {
            &self.render.alpha_blended
        } else {
            &self.render.additive
        };

        let encoder = encoder_for(&mut self.encoder, &self.context);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(Stage::Rasterize.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: views.color_target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(groups::RENDER_DATA_GROUP, &self.render_data_bind_group, &[]);
        pass.set_bind_group(groups::RENDER_VIEWS_GROUP, &views_bind_group, &[]);
        pass.set_index_buffer(self.buffers.quad_indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed_indirect(&self.buffers.draw_args, 0);
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(Some(encoder.finish()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_estimate() {
        // 32 + 48 + 16 + 4 bytes per slot, alive list padded to 1024 entries
        assert_eq!(GpuParticlePool::memory_estimate(1000), 100_000 + 1024 * 8);
    }
}
