//! Tests for GPU buffer layouts

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::mem;

    #[test]
    fn test_buffer_sizes() {
        // These must match the WGSL struct strides
        assert_eq!(mem::size_of::<ParticleA>(), 32);
        assert_eq!(mem::size_of::<ParticleB>(), 48);
        assert_eq!(mem::size_of::<IndexBufferElement>(), 8);
        assert_eq!(mem::size_of::<ViewSpacePositionRadius>(), 16);
        assert_eq!(mem::size_of::<ParticleCounters>(), 8);
        assert_eq!(mem::size_of::<DrawIndexedIndirectArgs>(), 20);
        assert_eq!(
            mem::size_of::<DrawIndexedIndirectArgs>() as u64,
            crate::constants::draw::INDIRECT_ARGS_SIZE
        );
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        assert_eq!(mem::size_of::<EmitterUniforms>(), 80);
        assert_eq!(mem::size_of::<FreeCountSnapshot>(), 16);
        assert_eq!(mem::size_of::<SimulationUniforms>(), 192);
        assert_eq!(mem::size_of::<RasterUniforms>(), 96);
        assert_eq!(mem::size_of::<SortParams>(), 16);
        assert!(mem::size_of::<SortParams>() as u64 <= crate::constants::sort::PARAMS_STRIDE);
    }

    #[test]
    fn test_draw_args_defaults() {
        let args = DrawIndexedIndirectArgs::particle_quads();
        assert_eq!(args.index_count, 6);
        assert_eq!(args.instance_count, 0);
        assert_eq!(bytemuck::bytes_of(&args).len(), 20);
    }

    #[test]
    fn test_dead_record() {
        let dead = ParticleB::dead();
        assert!(!dead.is_alive());
        assert_eq!(dead.age, crate::constants::pool::DEAD_AGE);
        assert!(ParticleB { age: 0.0, ..dead }.is_alive());
    }

    #[test]
    fn test_sort_schedule() {
        // log2(8) = 3 -> 1 + 2 + 3 steps
        let steps = SortParams::schedule(8);
        assert_eq!(steps.len(), 6);
        assert_eq!((steps[0].block, steps[0].stride), (2, 1));
        assert_eq!((steps[5].block, steps[5].stride), (8, 1));
        assert!(SortParams::schedule(1).is_empty());
    }
}
