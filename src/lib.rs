pub mod config;
pub mod constants;
pub mod error;
pub mod gpu;
pub mod particles;

pub use config::{ColorFormat, EmitterParameters, ParticleConfig, PoolConfig, RenderConfig, SimulationConfig};
pub use error::{EngineError, EngineResult};
pub use gpu::buffer_layouts::FrameUniforms;
pub use gpu::GpuContext;
pub use particles::{
    CpuParticlePool, CpuViews, DepthField, EmissionBudget, Emitter, GpuParticlePool, GpuViews,
    ParticleStages, ParticleSystem, PoolState, Stage,
};

/// Particle system running on the GPU
pub type GpuParticleSystem = ParticleSystem<GpuParticlePool>;

/// Particle system running on the host reference device
pub type CpuParticleSystem = ParticleSystem<CpuParticlePool>;

/// Create a GPU particle system and run its reset protocol
pub fn create_gpu_particle_system(
    context: &GpuContext,
    config: &ParticleConfig,
) -> EngineResult<GpuParticleSystem> {
    let pool = GpuParticlePool::new(context, config)?;
    Ok(ParticleSystem::new(pool, config))
}

/// Create a host particle system and run its reset protocol
pub fn create_cpu_particle_system(config: &ParticleConfig) -> EngineResult<CpuParticleSystem> {
    config.validate()?;
    Ok(ParticleSystem::new(CpuParticlePool::new(&config.pool), config))
}
