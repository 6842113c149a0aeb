// GPU particle constants - single source of truth.
//
// Values in this file are mirrored by the WGSL shaders under
// src/shaders. Change both together.

/// Slot pool sizing
pub mod pool {
    /// Default number of particle slots per emitter (400 * 1024)
    pub const DEFAULT_CAPACITY: u32 = 400 * 1024;

    /// Age written into a slot that is not owned by the simulation
    pub const DEAD_AGE: f32 = -1.0;
}

/// Compute dispatch constants
pub mod dispatch {
    /// Must match @workgroup_size in src/shaders/compute/particle_stages.wgsl
    pub const WORKGROUP_SIZE: u32 = 256;

    /// Number of workgroups needed to cover `lanes` invocations
    pub const fn workgroups_for(lanes: u32) -> u32 {
        (lanes + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
    }
}

/// Random field texture
pub mod random_field {
    /// Width and height of the square random field
    pub const DEFAULT_SIZE: u32 = 1024;

    /// Fixed seed so that runs are reproducible unless configured otherwise
    pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;
}

/// Indirect draw constants
pub mod draw {
    /// Two triangles per camera-facing quad
    pub const INDICES_PER_PARTICLE: u32 = 6;

    /// Quad index list, shared by every instance
    pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

    /// Size of the five-word DrawIndexedIndirect record
    pub const INDIRECT_ARGS_SIZE: u64 = 20;
}

/// Simulation defaults
pub mod simulation {
    /// Ambient acceleration applied to every awake particle, scaled by mass
    pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

    /// Velocity kept after a depth-buffer collision
    pub const DEFAULT_RESTITUTION: f32 = 0.3;

    /// Below this speed a colliding particle goes to sleep
    pub const DEFAULT_SLEEP_SPEED: f32 = 0.1;

    /// Alpha fades to zero over the last part of a particle's life
    pub const FADE_OUT_TIME: f32 = 0.2;
}

/// Sorting constants
pub mod sort {
    /// Stride between bitonic step parameters in the dynamic uniform buffer.
    /// Matches the default min_uniform_buffer_offset_alignment.
    pub const PARAMS_STRIDE: u64 = 256;

    /// Distance written into padding entries so they sort behind every particle
    pub const PADDING_DISTANCE: f32 = -1.0;

    /// Slot id carried by padding entries
    pub const PADDING_INDEX: u32 = u32::MAX;
}

/// Rendering defaults
pub mod render {
    pub const DEFAULT_SOFT_PARTICLE_DISTANCE: f32 = 0.5;
}
