//! Host reference device for the particle stages
//!
//! Used by tests and tools that have no GPU. Lanes run on the rayon pool and
//! share the free stack and alive list through atomic append buffers, so the
//! races the shaders face are exercised here too.

pub mod append_buffer;
pub mod depth;
pub mod kernels;
pub mod pool;

pub use append_buffer::{AppendBuffer, AppendElement};
pub use depth::DepthField;
pub use pool::{BlendMode, CpuParticlePool, CpuViews, DrawRecord, QuadInstance};
