//! GPU-resident particle pipeline
//!
//! A fixed pool of particle slots lives on the device. Each frame the pool
//! is driven through Emit, Simulate, an optional back-to-front Sort and
//! Rasterize, without the host ever reading particle state back.

pub mod cpu;
pub mod emitter;
pub mod gpu;
pub mod random_field;
pub mod stages;
pub mod system;

pub use cpu::{CpuParticlePool, CpuViews, DepthField};
pub use emitter::{EmissionBudget, Emitter};
pub use gpu::{GpuParticlePool, GpuViews};
pub use random_field::RandomField;
pub use stages::{ParticleStages, Stage};
pub use system::{FrameStats, ParticleSystem, PoolState};
