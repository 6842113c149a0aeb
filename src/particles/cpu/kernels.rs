//! Per-lane bodies of the compute and vertex shaders, on the host
//!
//! Each function here follows the matching WGSL function in
//! `src/shaders` line for line.

use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use super::depth::{linear_depth, DepthField};
use crate::constants::simulation::FADE_OUT_TIME;
use rayon::prelude::*;

use crate::gpu::buffer_layouts::{
    EmitterUniforms, IndexBufferElement, ParticleA, ParticleB, SimulationUniforms, SortParams,
    ViewSpacePositionRadius,
};

/// Quad corner offsets in vertex order, matching the quad index list
pub const QUAD_CORNERS: [Vec2; 4] = [
    Vec2::new(-1.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(-1.0, -1.0),
    Vec2::new(1.0, -1.0),
];

/// Uniforms unpacked once per Simulate dispatch
#[derive(Debug, Clone, Copy)]
pub struct SimulationStep {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub gravity: Vec3,
    pub dt: f32,
    pub near: f32,
    pub far: f32,
    pub collisions_enabled: bool,
    pub collision_thickness: f32,
    pub restitution: f32,
    pub sleep_speed: f32,
}

impl From<&SimulationUniforms> for SimulationStep {
    fn from(u: &SimulationUniforms) -> Self {
        Self {
            view: Mat4::from_cols_array_2d(&u.view),
            projection: Mat4::from_cols_array_2d(&u.projection),
            eye: Vec3::from_slice(&u.eye_position[..3]),
            gravity: Vec3::from_slice(&u.gravity[..3]),
            dt: u.dt,
            near: u.near,
            far: u.far,
            collisions_enabled: u.collisions_enabled != 0,
            collision_thickness: u.collision_thickness,
            restitution: u.restitution,
            sleep_speed: u.sleep_speed,
        }
    }
}

/// Fresh particle for an emission lane, given that lane's random texels
pub fn spawn(uniforms: &EmitterUniforms, position_jitter: Vec3, velocity_jitter: Vec3) -> (ParticleA, ParticleB) {
    let position = Vec3::from_slice(&uniforms.position[..3])
        + position_jitter * Vec3::from_slice(&uniforms.position_variance[..3]);
    let velocity =
        Vec3::from_slice(&uniforms.velocity[..3]) + velocity_jitter * uniforms.velocity_variance;

    let physical = ParticleB {
        position: position.to_array(),
        mass: uniforms.mass,
        velocity: velocity.to_array(),
        lifespan: uniforms.particle_lifespan,
        distance_to_eye: 0.0,
        age: 0.0,
        start_size: uniforms.start_size,
        end_size: uniforms.end_size,
    };
    (ParticleA::default(), physical)
}

/// Result of advancing one surviving particle
#[derive(Debug, Clone, Copy)]
pub struct Survivor {
    pub view_position: ViewSpacePositionRadius,
    /// Squared distance to the eye, the sort key
    pub distance_sq: f32,
}

/// Advance a live particle by one step.
///
/// The age is advanced first. A particle whose new age reaches its lifespan
/// is left untouched and `None` comes back, so the caller retires the slot.
/// Size and fade come from the new age.
pub fn advance(
    visual: &mut ParticleA,
    physical: &mut ParticleB,
    step: &SimulationStep,
    depth: Option<&DepthField>,
) -> Option<Survivor> {
    physical.age += step.dt;
    if physical.age >= physical.lifespan {
        return None;
    }

    let life = (physical.age / physical.lifespan).clamp(0.0, 1.0);
    let radius = physical.start_size + (physical.end_size - physical.start_size) * life;
    visual.tint_and_alpha[3] = ((physical.lifespan - physical.age) / FADE_OUT_TIME).clamp(0.0, 1.0);

    let mut position = Vec3::from_array(physical.position);
    let mut velocity = Vec3::from_array(physical.velocity);

    if visual.is_sleeping == 0 {
        velocity += step.gravity * physical.mass * step.dt;
        let previous = position;
        position += velocity * step.dt;

        let hit = match depth {
            Some(depth) if step.collisions_enabled => hits_scene(position, step, depth),
            _ => false,
        };
        if hit {
            position = previous;
            let to_viewer = step.eye - position;
            let normal = to_viewer / to_viewer.length_squared().max(1e-12).sqrt();
            velocity = reflect(velocity, normal) * step.restitution;
            if velocity.length() < step.sleep_speed {
                visual.is_sleeping = 1;
                velocity = Vec3::ZERO;
            }
        }
    }

    physical.position = position.to_array();
    physical.velocity = velocity.to_array();
    let to_eye = position - step.eye;
    physical.distance_to_eye = to_eye.length();

    Some(Survivor {
        view_position: ViewSpacePositionRadius {
            position: step.view.transform_point3(position).to_array(),
            radius,
        },
        distance_sq: to_eye.length_squared(),
    })
}

/// True when `position` lies behind the scene surface, but by less than the
/// collision thickness
pub fn hits_scene(position: Vec3, step: &SimulationStep, depth: &DepthField) -> bool {
    let view_position = step.view * position.extend(1.0);
    let clip = step.projection * view_position;
    if clip.w <= 0.0 {
        return false;
    }
    let ndc = clip.xyz() / clip.w;
    if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
        return false;
    }

    let (width, height) = (depth.width(), depth.height());
    let x = (((ndc.x * 0.5 + 0.5) * width as f32) as u32).min(width - 1);
    let y = (((0.5 - ndc.y * 0.5) * height as f32) as u32).min(height - 1);
    let scene = linear_depth(depth.load(x, y), step.near, step.far);
    let particle = -view_position.z;

    particle > scene && particle < scene + step.collision_thickness
}

pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    v - 2.0 * v.dot(normal) * normal
}

/// Fill `entries` with padding from `alive_count` up to its length
pub fn sort_pad(entries: &mut [IndexBufferElement], alive_count: usize) {
    if let Some(tail) = entries.get_mut(alive_count..) {
        tail.fill(IndexBufferElement::PADDING);
    }
}

/// One compare-exchange step of the bitonic network, far entries first.
///
/// Lane `i` pairs with `i ^ stride`. Pairs never overlap, so each run of
/// `2 * stride` entries is one independent task.
pub fn bitonic_step(entries: &mut [IndexBufferElement], params: &SortParams) {
    let length = (params.length as usize).min(entries.len());
    let stride = params.stride as usize;
    let block = params.block as usize;
    if stride == 0 {
        return;
    }

    entries[..length]
        .par_chunks_mut(2 * stride)
        .enumerate()
        .for_each(|(run, chunk)| {
            let first = run * 2 * stride;
            let descending = first & block == 0;
            let (low, high) = chunk.split_at_mut(stride.min(chunk.len()));
            for (lhs, rhs) in low.iter_mut().zip(high.iter_mut()) {
                let swap = if descending {
                    lhs.distance < rhs.distance
                } else {
                    lhs.distance > rhs.distance
                };
                if swap {
                    std::mem::swap(lhs, rhs);
                }
            }
        });
}

/// View-space corners of a particle quad, in vertex order
pub fn billboard_corners(view_position: &ViewSpacePositionRadius, rotation: f32) -> [Vec3; 4] {
    let centre = Vec3::from_array(view_position.position);
    let (sin, cos) = rotation.sin_cos();
    QUAD_CORNERS.map(|corner| {
        let rotated = Vec2::new(corner.x * cos - corner.y * sin, corner.x * sin + corner.y * cos);
        centre + (rotated * view_position.radius).extend(0.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(dt: f32) -> SimulationStep {
        SimulationStep {
            view: Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 1000.0),
            eye: Vec3::new(0.0, 0.0, 10.0),
            gravity: Vec3::new(0.0, -10.0, 0.0),
            dt,
            near: 0.1,
            far: 1000.0,
            collisions_enabled: true,
            collision_thickness: 2.0,
            restitution: 0.5,
            sleep_speed: 0.1,
        }
    }

    fn particle(velocity: Vec3) -> (ParticleA, ParticleB) {
        (
            ParticleA::default(),
            ParticleB {
                position: [0.0; 3],
                mass: 1.0,
                velocity: velocity.to_array(),
                lifespan: 2.0,
                distance_to_eye: 0.0,
                age: 0.0,
                start_size: 4.0,
                end_size: 2.0,
            },
        )
    }

    #[test]
    fn test_gravity_scaled_by_mass() {
        let (mut a, mut b) = particle(Vec3::ZERO);
        b.mass = 2.0;
        advance(&mut a, &mut b, &step(0.5), None);
        assert_eq!(b.velocity, [0.0, -10.0, 0.0]);
        assert_eq!(b.position, [0.0, -5.0, 0.0]);
        assert_eq!(b.age, 0.5);
    }

    #[test]
    fn test_size_and_fade_from_advanced_age() {
        let (mut a, mut b) = particle(Vec3::ZERO);
        b.age = 0.9;
        let survivor = advance(&mut a, &mut b, &step(0.1), None).unwrap();
        assert!((b.age - 1.0).abs() < 1e-6);
        assert!((survivor.view_position.radius - 3.0).abs() < 1e-5);
        assert_eq!(a.tint_and_alpha[3], 1.0);

        b.age = 1.8;
        advance(&mut a, &mut b, &step(0.1), None).unwrap();
        assert!((a.tint_and_alpha[3] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_expiring_step_returns_none_before_moving() {
        let (mut a, mut b) = particle(Vec3::new(1.0, 0.0, 0.0));
        b.age = 1.5;
        assert!(advance(&mut a, &mut b, &step(0.5), None).is_none());
        assert_eq!(b.age, 2.0);
        assert_eq!(b.position, [0.0; 3]);

        // Never reports a survivor whose age has reached its lifespan
        let (mut a, mut b) = particle(Vec3::ZERO);
        let mut steps = 0;
        while advance(&mut a, &mut b, &step(0.3), None).is_some() {
            assert!(b.age < b.lifespan);
            steps += 1;
        }
        assert_eq!(steps, 6);
    }

    #[test]
    fn test_view_position_and_sort_key() {
        let (mut a, mut b) = particle(Vec3::ZERO);
        let survivor = advance(&mut a, &mut b, &step(0.0), None).unwrap();
        let view = Vec3::from_array(survivor.view_position.position);
        assert!((view - Vec3::new(0.0, 0.0, -10.0)).length() < 1e-5);
        assert!((survivor.distance_sq - 100.0).abs() < 1e-3);
        assert!((b.distance_to_eye - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_collision_bounces_towards_camera() {
        let s = step(0.1);
        // Surface 9.9 units in front of the camera, particle moving away from it
        let depth = DepthField::at_view_distance(64, 64, 9.9, s.near, s.far);
        let (mut a, mut b) = particle(Vec3::new(0.0, 0.0, -5.0));
        b.position = [0.0, 0.0, 0.2];

        advance(&mut a, &mut b, &s, Some(&depth));
        assert_eq!(b.position, [0.0, 0.0, 0.2]);
        assert!(b.velocity[2] > 0.0, "velocity {:?}", b.velocity);
        assert_eq!(a.is_sleeping, 0);
    }

    #[test]
    fn test_slow_collision_puts_particle_to_sleep() {
        let mut s = step(0.1);
        s.gravity = Vec3::ZERO;
        s.sleep_speed = 10.0;
        let depth = DepthField::at_view_distance(64, 64, 9.9, s.near, s.far);
        let (mut a, mut b) = particle(Vec3::new(0.0, 0.0, -5.0));
        b.position = [0.0, 0.0, 0.2];

        advance(&mut a, &mut b, &s, Some(&depth));
        assert_eq!(a.is_sleeping, 1);
        assert_eq!(b.velocity, [0.0; 3]);

        // Sleeping particles age but no longer move
        advance(&mut a, &mut b, &s, Some(&depth));
        assert_eq!(b.position, [0.0, 0.0, 0.2]);
        assert!((b.age - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_no_collision_without_depth_or_when_disabled() {
        let mut s = step(0.1);
        let depth = DepthField::at_view_distance(8, 8, 9.9, s.near, s.far);
        let (mut a, mut b) = particle(Vec3::new(0.0, 0.0, -5.0));
        b.position = [0.0, 0.0, 0.2];
        s.collisions_enabled = false;
        advance(&mut a, &mut b, &s, Some(&depth));
        assert!(b.velocity[2] < 0.0);
    }

    #[test]
    fn test_bitonic_network_sorts_padded_list() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        for alive in [0usize, 1, 2, 3, 37, 300, 1000] {
            let capacity = 1000u32;
            let length = capacity.next_power_of_two();
            let live: Vec<IndexBufferElement> = (0..alive)
                .map(|i| IndexBufferElement {
                    distance: rng.gen_range(0.0..500.0),
                    index: i as u32,
                })
                .collect();

            // Stale entries past the alive count must be overwritten
            let mut entries = vec![IndexBufferElement { distance: 1e9, index: 9 }; length as usize];
            entries[..alive].copy_from_slice(&live);
            sort_pad(&mut entries, alive);
            for params in SortParams::schedule(length) {
                bitonic_step(&mut entries, &params);
            }

            let sorted = &entries[..alive];
            assert!(
                sorted.windows(2).all(|w| w[0].distance >= w[1].distance),
                "not back to front with {} alive",
                alive
            );
            assert!(entries[alive..].iter().all(|e| *e == IndexBufferElement::PADDING));

            let mut got: Vec<u32> = sorted.iter().map(|e| e.index).collect();
            got.sort_unstable();
            assert_eq!(got, (0..alive as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_bitonic_step_direction_follows_block() {
        let mut entries: Vec<IndexBufferElement> = [1.0, 2.0, 4.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, &distance)| IndexBufferElement { distance, index: i as u32 })
            .collect();
        bitonic_step(&mut entries, &SortParams { block: 2, stride: 1, length: 4, _padding: 0 });
        let distances: Vec<f32> = entries.iter().map(|e| e.distance).collect();
        // First pair descending, second ascending
        assert_eq!(distances, vec![2.0, 1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_billboard_corners_span_radius() {
        let vp = ViewSpacePositionRadius {
            position: [1.0, 2.0, -5.0],
            radius: 0.5,
        };
        let corners = billboard_corners(&vp, 0.0);
        assert_eq!(corners[0], Vec3::new(0.5, 2.5, -5.0));
        assert_eq!(corners[3], Vec3::new(1.5, 1.5, -5.0));
    }
}
