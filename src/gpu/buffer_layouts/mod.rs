//! Centralized GPU buffer layout definitions for the particle pipeline
//!
//! Every struct in here is mirrored by a WGSL declaration under
//! src/shaders. Sizes are pinned by the tests in this module.

pub mod commands;
pub mod particle;
pub mod uniforms;

#[cfg(test)]
mod tests;

pub use commands::DrawIndexedIndirectArgs;
pub use particle::{IndexBufferElement, ParticleA, ParticleB, ParticleCounters, ViewSpacePositionRadius};
pub use uniforms::{
    EmitterUniforms, FrameUniforms, FreeCountSnapshot, RasterUniforms, SimulationUniforms,
    SortParams,
};

/// Buffer binding indices shared with the shaders
pub mod bindings {
    /// Group 0 of every compute pipeline: the particle pool itself
    pub mod pool {
        pub const PARTICLES_A: u32 = 0;
        pub const PARTICLES_B: u32 = 1;
        pub const FREE_LIST: u32 = 2;
        pub const ALIVE_LIST: u32 = 3;
        pub const VIEW_POSITIONS: u32 = 4;
        pub const COUNTERS: u32 = 5;
        pub const DRAW_ARGS: u32 = 6;
    }

    /// Group 1, one stage at a time. Numbers never overlap so all stages can
    /// live in one shader module.
    pub mod stage {
        pub const EMITTER_UNIFORMS: u32 = 0;
        pub const FREE_COUNT_SNAPSHOT: u32 = 1;
        pub const RANDOM_FIELD: u32 = 2;
        pub const SIMULATION_UNIFORMS: u32 = 3;
        pub const SCENE_DEPTH: u32 = 4;
        pub const SORT_PARAMS: u32 = 5;
    }

    /// Render pipeline bindings
    pub mod render {
        pub const ALIVE_LIST: u32 = 0;
        pub const VIEW_POSITIONS: u32 = 1;
        pub const PARTICLES_A: u32 = 2;
        pub const RASTER_UNIFORMS: u32 = 3;
        pub const PARTICLE_TEXTURE: u32 = 0;
        pub const PARTICLE_SAMPLER: u32 = 1;
        pub const SCENE_DEPTH: u32 = 2;
    }
}

/// Bind group indices
pub mod groups {
    pub const POOL_GROUP: u32 = 0;
    pub const STAGE_GROUP: u32 = 1;
    pub const RENDER_DATA_GROUP: u32 = 0;
    pub const RENDER_VIEWS_GROUP: u32 = 1;
}
