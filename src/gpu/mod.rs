//! GPU device setup and buffer layouts shared by the particle pipeline

pub mod buffer_layouts;
pub mod context;
pub mod error;
pub mod targets;

pub use buffer_layouts::{
    DrawIndexedIndirectArgs, IndexBufferElement, ParticleA, ParticleB, ParticleCounters,
    ViewSpacePositionRadius,
};
pub use context::GpuContext;
pub use error::{buffer_mapping_error, gpu_operation_error, validated, GpuErrorContext};
pub use targets::OffscreenTargets;
