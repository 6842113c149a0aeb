//! Uniform blocks uploaded once per stage

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::config::SimulationConfig;
use crate::particles::Emitter;

/// Emit stage parameters
/// Total size: 80 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EmitterUniforms {
    pub position: [f32; 4],
    pub velocity: [f32; 4],
    pub position_variance: [f32; 4],
    /// Upper bound on emission lanes for this dispatch
    pub max_particles_this_frame: u32,
    pub particle_lifespan: f32,
    pub start_size: f32,
    pub end_size: f32,
    pub velocity_variance: f32,
    pub mass: f32,
    /// Selects the random field row
    pub elapsed_time: f32,
    pub _padding: f32,
}

impl EmitterUniforms {
    pub fn new(emitter: &Emitter, number_to_emit: u32) -> Self {
        Self {
            position: emitter.position.extend(1.0).to_array(),
            velocity: emitter.velocity.extend(0.0).to_array(),
            position_variance: emitter.position_variance.extend(0.0).to_array(),
            max_particles_this_frame: number_to_emit,
            particle_lifespan: emitter.particle_lifespan,
            start_size: emitter.start_size,
            end_size: emitter.end_size,
            velocity_variance: emitter.velocity_variance,
            mass: emitter.mass,
            elapsed_time: emitter.budget.elapsed_time,
            _padding: 0.0,
        }
    }
}

/// Free stack count copied on the device right before Emit
/// Total size: 16 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FreeCountSnapshot {
    pub count: u32,
    pub _padding: [u32; 3],
}

/// Simulate stage parameters
/// Total size: 192 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SimulationUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub eye_position: [f32; 4],
    /// Ambient acceleration, scaled by particle mass
    pub gravity: [f32; 4],
    pub dt: f32,
    pub near: f32,
    pub far: f32,
    pub collisions_enabled: u32,
    pub collision_thickness: f32,
    pub restitution: f32,
    pub sleep_speed: f32,
    pub capacity: u32,
}

/// Camera state the rendering layer hands over each frame
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye_position: Vec3,
    pub near: f32,
    pub far: f32,
    pub screen_width: f32,
    pub screen_height: f32,
    pub dt: f32,
}

impl FrameUniforms {
    /// Right-handed perspective camera looking from `eye` at `target`
    pub fn looking_at(eye: Vec3, target: Vec3, width: u32, height: u32, dt: f32) -> Self {
        let near = 0.1;
        let far = 1000.0;
        let aspect = width as f32 / height.max(1) as f32;
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(60f32.to_radians(), aspect, near, far),
            eye_position: eye,
            near,
            far,
            screen_width: width as f32,
            screen_height: height as f32,
            dt,
        }
    }
}

impl SimulationUniforms {
    pub fn new(
        frame: &FrameUniforms,
        emitter: &Emitter,
        simulation: &SimulationConfig,
        capacity: u32,
    ) -> Self {
        // A paused emitter freezes its particles in place
        let dt = if emitter.pause { 0.0 } else { frame.dt };
        Self {
            view: frame.view.to_cols_array_2d(),
            projection: frame.projection.to_cols_array_2d(),
            eye_position: frame.eye_position.extend(1.0).to_array(),
            gravity: simulation.gravity.extend(0.0).to_array(),
            dt,
            near: frame.near,
            far: frame.far,
            collisions_enabled: emitter.collisions_enabled as u32,
            collision_thickness: emitter.collision_thickness,
            restitution: simulation.restitution,
            sleep_speed: simulation.sleep_speed,
            capacity,
        }
    }
}

/// Rasterize stage parameters
/// Total size: 96 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct RasterUniforms {
    pub projection: [[f32; 4]; 4],
    pub screen_size: [f32; 2],
    pub near: f32,
    pub far: f32,
    pub soft_particle_distance: f32,
    pub alpha_blended: u32,
    pub _padding: [f32; 2],
}

impl RasterUniforms {
    pub fn new(frame: &FrameUniforms, emitter: &Emitter, soft_particle_distance: f32) -> Self {
        Self {
            projection: frame.projection.to_cols_array_2d(),
            screen_size: [frame.screen_width, frame.screen_height],
            near: frame.near,
            far: frame.far,
            soft_particle_distance,
            alpha_blended: emitter.alpha_blended as u32,
            _padding: [0.0; 2],
        }
    }
}

/// One bitonic merge step
/// Total size: 16 bytes, stored at a 256 byte stride
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct SortParams {
    /// Size of the bitonic sequences being merged
    pub block: u32,
    /// Compare distance for this step
    pub stride: u32,
    /// Padded list length
    pub length: u32,
    pub _padding: u32,
}

impl SortParams {
    /// Every (block, stride) pair of a full bitonic sort over `length`
    /// entries. `length` must be a power of two.
    pub fn schedule(length: u32) -> Vec<SortParams> {
        let mut steps = Vec::new();
        let mut block = 2;
        while block <= length {
            let mut stride = block / 2;
            while stride > 0 {
                steps.push(SortParams {
                    block,
                    stride,
                    length,
                    _padding: 0,
                });
                stride /= 2;
            }
            block *= 2;
        }
        steps
    }
}
