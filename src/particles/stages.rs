//! The stage seam between frame orchestration and the device that runs it

use crate::gpu::buffer_layouts::{EmitterUniforms, RasterUniforms, SimulationUniforms};

/// Pipeline stages, in the order a frame records them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    InitFreeList,
    ResetParticles,
    Emit,
    Simulate,
    Sort,
    Rasterize,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::InitFreeList => "Init Free List",
            Stage::ResetParticles => "Reset Particles",
            Stage::Emit => "Emit",
            Stage::Simulate => "Simulate",
            Stage::Sort => "Sort",
            Stage::Rasterize => "Rasterize",
        }
    }
}

/// A device that owns one slot pool and can run every stage over it.
///
/// Stages are recorded in call order and each one sees every write of the
/// stage before it. None of them can fail once the pool exists.
pub trait ParticleStages {
    /// Per-frame views supplied by the rendering layer
    type Views<'a>;

    /// Number of slots in the pool
    fn capacity(&self) -> u32;

    /// Push every slot id onto the free stack and set its count to capacity
    fn init_free_list(&mut self);

    /// Mark every slot dead and awake
    fn reset_particles(&mut self);

    /// Spawn up to `uniforms.max_particles_this_frame` particles, never more
    /// than the free stack held when the stage began
    fn emit(&mut self, uniforms: &EmitterUniforms);

    /// Age, integrate and retire every live slot and rebuild the alive list
    fn simulate(&mut self, uniforms: &SimulationUniforms, views: &Self::Views<'_>);

    /// Order the alive list back to front
    fn sort_alive(&mut self);

    /// Draw one quad per alive entry, count taken from the draw arguments
    fn rasterize(&mut self, uniforms: &RasterUniforms, views: &Self::Views<'_>);

    /// Hand recorded work to the device
    fn flush(&mut self) {}
}
