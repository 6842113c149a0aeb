//! Particle slot records and the per-survivor records built by Simulate

use bytemuck::{Pod, Zeroable};

use crate::constants::pool::DEAD_AGE;
use crate::constants::sort::{PADDING_DISTANCE, PADDING_INDEX};

/// Visual half of a particle slot
/// Total size: 32 bytes (WGSL array stride)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleA {
    /// Tint colour, alpha in w
    pub tint_and_alpha: [f32; 4],
    /// Rotation angle of the quad in radians
    pub rotation: f32,
    /// Non-zero once a colliding particle has come to rest
    pub is_sleeping: u32,
    pub _padding: [u32; 2],
}

impl Default for ParticleA {
    fn default() -> Self {
        Self {
            tint_and_alpha: [1.0, 1.0, 1.0, 1.0],
            rotation: 0.0,
            is_sleeping: 0,
            _padding: [0; 2],
        }
    }
}

/// Physical half of a particle slot
/// Total size: 48 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleB {
    /// World space position
    pub position: [f32; 3],
    pub mass: f32,
    /// World space velocity
    pub velocity: [f32; 3],
    pub lifespan: f32,
    pub distance_to_eye: f32,
    /// Time lived so far, DEAD_AGE while the slot is free
    pub age: f32,
    pub start_size: f32,
    pub end_size: f32,
}

impl ParticleB {
    /// Record of a slot that has been reset or retired
    pub fn dead() -> Self {
        Self {
            age: DEAD_AGE,
            ..Self::zeroed()
        }
    }

    pub fn is_alive(&self) -> bool {
        self.age >= 0.0
    }
}

impl Default for ParticleB {
    fn default() -> Self {
        Self::dead()
    }
}

/// One entry of the alive-index list
/// Total size: 8 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct IndexBufferElement {
    /// Squared distance from the particle to the eye, used for sorting
    pub distance: f32,
    /// Slot id of the particle
    pub index: u32,
}

impl IndexBufferElement {
    /// Filler past the alive count, sorts behind every particle
    pub const PADDING: Self = Self {
        distance: PADDING_DISTANCE,
        index: PADDING_INDEX,
    };
}

/// View-space centre and display radius of a particle, indexed by slot id
/// Total size: 16 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ViewSpacePositionRadius {
    pub position: [f32; 3],
    pub radius: f32,
}

/// Live counts of the free stack and of this frame's alive list
/// Total size: 8 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ParticleCounters {
    pub free_count: u32,
    pub alive_count: u32,
}

impl ParticleCounters {
    /// Byte offset of `alive_count`, cleared before every Simulate
    pub const ALIVE_COUNT_OFFSET: u64 = 4;
}
