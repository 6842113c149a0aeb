//! Device buffers and textures owned by one slot pool

use wgpu::util::DeviceExt;

use crate::constants::{dispatch::workgroups_for, draw, sort};
use crate::error::EngineResult;
use crate::gpu::buffer_layouts::{
    DrawIndexedIndirectArgs, EmitterUniforms, FreeCountSnapshot, IndexBufferElement, ParticleA,
    ParticleB, ParticleCounters, RasterUniforms, SimulationUniforms, SortParams,
    ViewSpacePositionRadius,
};
use crate::gpu::error::gpu_operation_error;
use crate::particles::random_field::RandomField;

/// Storage buffers bound by every compute stage
pub const POOL_STORAGE_BUFFERS: u32 = 7;

/// Size in bytes of the largest storage buffer a pool of `capacity` slots
/// binds
pub fn largest_storage_binding(capacity: u32) -> u64 {
    let slots = capacity as u64;
    let per_slot = [
        std::mem::size_of::<ParticleA>(),
        std::mem::size_of::<ParticleB>(),
        std::mem::size_of::<ViewSpacePositionRadius>(),
        std::mem::size_of::<u32>(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0) as u64;
    let alive = capacity.next_power_of_two() as u64 * std::mem::size_of::<IndexBufferElement>() as u64;
    (slots * per_slot).max(alive)
}

/// Fail before any resource is created when the device cannot hold or
/// dispatch over a pool of `capacity` slots
pub fn check_device_limits(capacity: u32, limits: &wgpu::Limits) -> EngineResult<()> {
    const OPERATION: &str = "create particle pool";

    let largest = largest_storage_binding(capacity);
    if largest > limits.max_storage_buffer_binding_size as u64 {
        return Err(gpu_operation_error(
            OPERATION,
            format!(
                "{} slots need a {} byte storage binding, device allows {}",
                capacity, largest, limits.max_storage_buffer_binding_size
            ),
        ));
    }
    if largest > limits.max_buffer_size {
        return Err(gpu_operation_error(
            OPERATION,
            format!(
                "{} slots need a {} byte buffer, device allows {}",
                capacity, largest, limits.max_buffer_size
            ),
        ));
    }

    let workgroups = workgroups_for(capacity.next_power_of_two());
    if workgroups > limits.max_compute_workgroups_per_dimension {
        return Err(gpu_operation_error(
            OPERATION,
            format!(
                "{} slots need {} workgroups per dispatch, device allows {}",
                capacity, workgroups, limits.max_compute_workgroups_per_dimension
            ),
        ));
    }

    if POOL_STORAGE_BUFFERS > limits.max_storage_buffers_per_shader_stage {
        return Err(gpu_operation_error(
            OPERATION,
            format!(
                "{} storage buffers per stage needed, device allows {}",
                POOL_STORAGE_BUFFERS, limits.max_storage_buffers_per_shader_stage
            ),
        ));
    }
    Ok(())
}

fn storage_buffer(device: &wgpu::Device, label: &str, size: u64, extra: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE | extra,
        mapped_at_creation: false,
    })
}

fn uniform_buffer<T>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Every buffer of the pool, sized at creation and never resized
pub struct PoolBuffers {
    pub particles_a: wgpu::Buffer,
    pub particles_b: wgpu::Buffer,
    pub free_list: wgpu::Buffer,
    /// Padded to a power of two for the bitonic sort
    pub alive_list: wgpu::Buffer,
    pub view_positions: wgpu::Buffer,
    pub counters: wgpu::Buffer,
    pub draw_args: wgpu::Buffer,
    pub quad_indices: wgpu::Buffer,

    pub emitter_uniforms: wgpu::Buffer,
    pub free_count_snapshot: wgpu::Buffer,
    pub simulation_uniforms: wgpu::Buffer,
    pub raster_uniforms: wgpu::Buffer,
    /// One SortParams per bitonic step at PARAMS_STRIDE
    pub sort_params: wgpu::Buffer,
    pub sort_steps: u32,
    pub sort_length: u32,
}

impl PoolBuffers {
    pub fn new(device: &wgpu::Device, capacity: u32) -> Self {
        let slots = capacity as u64;
        let sort_length = capacity.next_power_of_two();
        let copy = wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;

        let particles_a = storage_buffer(
            device,
            "Particle A Buffer",
            slots * std::mem::size_of::<ParticleA>() as u64,
            copy,
        );
        let particles_b = storage_buffer(
            device,
            "Particle B Buffer",
            slots * std::mem::size_of::<ParticleB>() as u64,
            copy,
        );
        let free_list = storage_buffer(device, "Particle Free List Buffer", slots * 4, copy);
        let alive_list = storage_buffer(
            device,
            "Particle Alive List Buffer",
            sort_length as u64 * std::mem::size_of::<IndexBufferElement>() as u64,
            copy,
        );
        let view_positions = storage_buffer(
            device,
            "Particle View Space Positions Buffer",
            slots * std::mem::size_of::<ViewSpacePositionRadius>() as u64,
            copy,
        );

        let counters = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Counters Buffer"),
            contents: bytemuck::bytes_of(&ParticleCounters::default()),
            usage: wgpu::BufferUsages::STORAGE | copy,
        });
        let draw_args = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Draw Args Buffer"),
            contents: bytemuck::bytes_of(&DrawIndexedIndirectArgs::particle_quads()),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT | copy,
        });
        let quad_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Quad Index Buffer"),
            contents: bytemuck::cast_slice(&draw::QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let schedule = SortParams::schedule(sort_length);
        let sort_steps = schedule.len() as u32;
        let mut sort_bytes = vec![0u8; schedule.len().max(1) * sort::PARAMS_STRIDE as usize];
        for (i, step) in schedule.iter().enumerate() {
            let at = i * sort::PARAMS_STRIDE as usize;
            sort_bytes[at..at + std::mem::size_of::<SortParams>()]
                .copy_from_slice(bytemuck::bytes_of(step));
        }
        let sort_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Sort Params Buffer"),
            contents: &sort_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        Self {
            particles_a,
            particles_b,
            free_list,
            alive_list,
            view_positions,
            counters,
            draw_args,
            quad_indices,
            emitter_uniforms: uniform_buffer::<EmitterUniforms>(device, "Emitter Uniform Buffer"),
            free_count_snapshot: uniform_buffer::<FreeCountSnapshot>(
                device,
                "Free Count Snapshot Buffer",
            ),
            simulation_uniforms: uniform_buffer::<SimulationUniforms>(
                device,
                "Simulation Uniform Buffer",
            ),
            raster_uniforms: uniform_buffer::<RasterUniforms>(device, "Raster Uniform Buffer"),
            sort_params,
            sort_steps,
            sort_length,
        }
    }
}

/// Upload the random field as an Rgba32Float texture
pub fn create_random_field_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    field: &RandomField,
) -> (wgpu::Texture, wgpu::TextureView) {
    let size = wgpu::Extent3d {
        width: field.size(),
        height: field.size(),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Particle Random Field Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        field.as_bytes(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(field.size() * 16),
            rows_per_image: Some(field.size()),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Linear clamp sampler for particle textures
pub fn create_particle_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Particle Texture Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Soft round falloff, used when an emitter has no texture of its own
pub fn default_particle_image(size: u32) -> image::RgbaImage {
    let centre = (size as f32 - 1.0) * 0.5;
    image::RgbaImage::from_fn(size, size, |x, y| {
        let dx = (x as f32 - centre) / centre.max(1.0);
        let dy = (y as f32 - centre) / centre.max(1.0);
        let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
        image::Rgba([255, 255, 255, (falloff * falloff * 255.0) as u8])
    })
}

/// Upload an RGBA image as a sampled particle texture
pub fn create_particle_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &image::RgbaImage,
    label: &str,
) -> (wgpu::Texture, wgpu::TextureView) {
    let (width, height) = image.dimensions();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Load a particle texture from disk as RGBA8
pub fn load_particle_image(path: &std::path::Path) -> crate::error::EngineResult<image::RgbaImage> {
    let image = image::open(path)?;
    log::debug!("[GpuParticlePool] Loaded particle texture {}", path.display());
    Ok(image.to_rgba8())
}
