//! Indirect command buffer layout

use bytemuck::{Pod, Zeroable};

use crate::constants::draw::INDICES_PER_PARTICLE;

/// GPU indirect draw indexed command structure
/// Matches wgpu's DrawIndexedIndirect command layout exactly
/// Total size: 20 bytes
///
/// Only `instance_count` changes after creation; the simulation writes it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indices per particle quad
    pub index_count: u32,

    /// Number of surviving particles
    pub instance_count: u32,

    /// Offset into the index buffer
    pub first_index: u32,

    /// Value added to each index before fetching vertex
    pub base_vertex: i32,

    /// Offset into the instance range
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Arguments for one quad per instance and no instances yet
    pub fn particle_quads() -> Self {
        Self {
            index_count: INDICES_PER_PARTICLE,
            instance_count: 0,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }
}
