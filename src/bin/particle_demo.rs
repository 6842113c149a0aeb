//! Headless particle demo
//!
//! Runs one emitter on the GPU for a number of frames into offscreen targets
//! and logs the pool counters as it goes.
//!
//! Usage: particle_demo [config.toml|config.json] [frames]

use anyhow::{Context, Result};
use glam::Vec3;

use gpu_particles::gpu::OffscreenTargets;
use gpu_particles::particles::gpu::{create_particle_texture, default_particle_image, load_particle_image};
use gpu_particles::{
    create_gpu_particle_system, Emitter, FrameUniforms, GpuContext, GpuViews, ParticleConfig,
};

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const FRAME_TIME: f32 = 1.0 / 60.0;
const REPORT_INTERVAL: u32 = 30;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => ParticleConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => ParticleConfig::default(),
    };
    let frames: u32 = match args.next() {
        Some(raw) => raw.parse().context("frame count must be a number")?,
        None => 300,
    };

    let preset = config.emitters.first();
    let mut emitter = preset.map(Emitter::from_parameters).unwrap_or_default();
    let particle_image = match preset.and_then(|p| p.texture_path.as_deref()) {
        Some(path) => load_particle_image(path)?,
        None => default_particle_image(64),
    };
    log::info!(
        "Emitter '{}': {} particles/s, lifespan {}s",
        preset.map(|p| p.name.as_str()).unwrap_or("default"),
        emitter.particles_per_second,
        emitter.particle_lifespan
    );

    let context = GpuContext::headless_blocking()?;
    let targets = OffscreenTargets::new(&context, WIDTH, HEIGHT, config.render.color_format.to_wgpu());
    targets.clear(&context, wgpu::Color::BLACK, 1.0);
    let (_particle_texture, particle_view) =
        create_particle_texture(&context.device, &context.queue, &particle_image, "Particle Texture");

    let mut system = create_gpu_particle_system(&context, &config)?;
    let camera = FrameUniforms::looking_at(
        Vec3::new(0.0, 10.0, 60.0),
        Vec3::new(0.0, 10.0, 0.0),
        targets.width,
        targets.height,
        FRAME_TIME,
    );

    for frame in 0..frames {
        system.update(FRAME_TIME, &mut emitter);
        system.render(
            &mut emitter,
            &camera,
            GpuViews {
                color_target: &targets.color_view,
                scene_depth: &targets.depth_view,
                particle_texture: &particle_view,
            },
        );

        if frame % REPORT_INTERVAL == 0 || frame + 1 == frames {
            let counters = system.stages_mut().read_counters()?;
            log::info!(
                "frame {:>5}: alive {:>7} free {:>7} (capacity {})",
                frame,
                counters.alive_count,
                counters.free_count,
                system.capacity()
            );
            if counters.alive_count + counters.free_count != system.capacity() {
                log::warn!("Slot accounting mismatch: alive + free != capacity");
            }
        }
    }

    let stats = system.stats();
    log::info!(
        "Rendered {} frames, {} particles requested in total",
        stats.frames_rendered,
        stats.requested_total
    );
    Ok(())
}
