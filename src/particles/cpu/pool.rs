use glam::Vec3;
use rayon::prelude::*;

use super::append_buffer::AppendBuffer;
use super::depth::DepthField;
use super::kernels::{self, SimulationStep};
use crate::config::PoolConfig;
use crate::gpu::buffer_layouts::{
    DrawIndexedIndirectArgs, EmitterUniforms, IndexBufferElement, ParticleA, ParticleB,
    RasterUniforms, SimulationUniforms, SortParams, ViewSpacePositionRadius,
};
use crate::particles::random_field::RandomField;
use crate::particles::stages::{ParticleStages, Stage};

/// Per-frame inputs of the host device
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuViews<'a> {
    /// Scene depth for collisions; no depth means nothing to collide with
    pub depth: Option<&'a DepthField>,
}

/// How a draw combines with the colour target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    AlphaBlend,
    Additive,
}

/// One camera-facing quad produced by the vertex stage
#[derive(Debug, Clone, PartialEq)]
pub struct QuadInstance {
    pub slot: u32,
    /// View-space corners in vertex order
    pub corners: [Vec3; 4],
    pub tint_and_alpha: [f32; 4],
}

/// Everything the last Rasterize stage drew
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub args: DrawIndexedIndirectArgs,
    pub blend: BlendMode,
    pub quads: Vec<QuadInstance>,
}

/// Host implementation of the particle stages.
///
/// Runs the same per-lane bodies as the shaders, one rayon task per lane,
/// over the same record layouts. Every stage completes before the call
/// returns, so a stage always sees all writes of the previous one.
pub struct CpuParticlePool {
    capacity: u32,
    visual: Vec<ParticleA>,
    physical: Vec<ParticleB>,
    view_positions: Vec<ViewSpacePositionRadius>,
    free_list: AppendBuffer<u32>,
    alive_list: AppendBuffer<IndexBufferElement>,
    draw_args: DrawIndexedIndirectArgs,
    random_field: RandomField,
    stage_log: Vec<Stage>,
    last_draw: Option<DrawRecord>,
}

impl CpuParticlePool {
    pub fn new(config: &PoolConfig) -> Self {
        let capacity = config.capacity;
        log::info!("[CpuParticlePool] Allocating {} particle slots", capacity);

        Self {
            capacity,
            visual: vec![ParticleA::default(); capacity as usize],
            physical: vec![ParticleB::dead(); capacity as usize],
            view_positions: vec![ViewSpacePositionRadius::default(); capacity as usize],
            free_list: AppendBuffer::new(capacity),
            alive_list: AppendBuffer::new(capacity),
            draw_args: DrawIndexedIndirectArgs::particle_quads(),
            random_field: RandomField::generate(config.random_field_size, config.random_seed),
            stage_log: Vec::new(),
            last_draw: None,
        }
    }

    /// Entries on the free stack
    pub fn free_count(&self) -> u32 {
        self.free_list.len()
    }

    /// Entries on the alive list built by the last Simulate
    pub fn alive_count(&self) -> u32 {
        self.alive_list.len()
    }

    pub fn free_slots(&self) -> Vec<u32> {
        self.free_list.to_vec()
    }

    pub fn alive_entries(&self) -> Vec<IndexBufferElement> {
        self.alive_list.to_vec()
    }

    pub fn alive_slots(&self) -> Vec<u32> {
        self.alive_list.to_vec().into_iter().map(|e| e.index).collect()
    }

    pub fn draw_args(&self) -> DrawIndexedIndirectArgs {
        self.draw_args
    }

    /// Both halves of a slot, if the id is in range
    pub fn slot(&self, slot: u32) -> Option<(&ParticleA, &ParticleB)> {
        let i = slot as usize;
        Some((self.visual.get(i)?, self.physical.get(i)?))
    }

    pub fn view_position(&self, slot: u32) -> Option<&ViewSpacePositionRadius> {
        self.view_positions.get(slot as usize)
    }

    /// Every stage run so far, in order
    pub fn stage_log(&self) -> &[Stage] {
        &self.stage_log
    }

    pub fn clear_stage_log(&mut self) {
        self.stage_log.clear();
    }

    pub fn last_draw(&self) -> Option<&DrawRecord> {
        self.last_draw.as_ref()
    }

    pub fn random_field(&self) -> &RandomField {
        &self.random_field
    }
}

impl ParticleStages for CpuParticlePool {
    type Views<'a> = CpuViews<'a>;

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn init_free_list(&mut self) {
        self.stage_log.push(Stage::InitFreeList);
        self.free_list.fill_with_positions();
    }

    fn reset_particles(&mut self) {
        self.stage_log.push(Stage::ResetParticles);
        self.visual
            .par_iter_mut()
            .for_each(|a| *a = ParticleA::default());
        self.physical
            .par_iter_mut()
            .for_each(|b| *b = ParticleB::dead());
        self.view_positions
            .par_iter_mut()
            .for_each(|v| *v = ViewSpacePositionRadius::default());
        self.alive_list.set_len(0);
        self.draw_args.instance_count = 0;
    }

    fn emit(&mut self, uniforms: &EmitterUniforms) {
        self.stage_log.push(Stage::Emit);

        // Count of the free stack when the stage begins
        let available = self.free_list.len();
        let lanes = uniforms.max_particles_this_frame.min(available);
        if lanes < uniforms.max_particles_this_frame {
            log::debug!(
                "[CpuParticlePool] Free stack exhausted: emitting {} of {}",
                lanes,
                uniforms.max_particles_this_frame
            );
        }

        let free_list = &self.free_list;
        let random_field = &self.random_field;
        let spawned: Vec<(u32, ParticleA, ParticleB)> = (0..lanes)
            .into_par_iter()
            .map(|lane| {
                let slot = free_list.consume();
                let (position_jitter, velocity_jitter) =
                    random_field.emission_jitter(lane, uniforms.elapsed_time);
                let (a, b) = kernels::spawn(uniforms, position_jitter, velocity_jitter);
                (slot, a, b)
            })
            .collect();

        for (slot, a, b) in spawned {
            self.visual[slot as usize] = a;
            self.physical[slot as usize] = b;
        }
    }

    fn simulate(&mut self, uniforms: &SimulationUniforms, views: &CpuViews<'_>) {
        self.stage_log.push(Stage::Simulate);

        let step = SimulationStep::from(uniforms);
        let depth = views.depth;
        let free_list = &self.free_list;
        let alive_list = &self.alive_list;
        alive_list.set_len(0);

        self.visual
            .par_iter_mut()
            .zip(self.physical.par_iter_mut())
            .zip(self.view_positions.par_iter_mut())
            .enumerate()
            .for_each(|(slot, ((a, b), view_position))| {
                if !b.is_alive() {
                    return;
                }

                match kernels::advance(a, b, &step, depth) {
                    Some(survivor) => {
                        *view_position = survivor.view_position;
                        alive_list.append(IndexBufferElement {
                            distance: survivor.distance_sq,
                            index: slot as u32,
                        });
                    }
                    None => {
                        *b = ParticleB::dead();
                        a.is_sleeping = 0;
                        free_list.append(slot as u32);
                    }
                }
            });

        self.draw_args.instance_count = self.alive_list.len();
    }

    fn sort_alive(&mut self) {
        self.stage_log.push(Stage::Sort);

        // Same network as the device: pad to a power of two, run every
        // step, keep the live prefix
        let alive = self.alive_list.len() as usize;
        let length = self.capacity.next_power_of_two();
        let mut entries = self.alive_list.to_vec();
        entries.resize(length as usize, IndexBufferElement::default());
        kernels::sort_pad(&mut entries, alive);
        for params in SortParams::schedule(length) {
            kernels::bitonic_step(&mut entries, &params);
        }
        entries.truncate(alive);
        self.alive_list.overwrite(&entries);
    }

    fn rasterize(&mut self, uniforms: &RasterUniforms, _views: &CpuViews<'_>) {
        self.stage_log.push(Stage::Rasterize);

        let args = self.draw_args;
        let quads: Vec<QuadInstance> = (args.first_instance..args.first_instance + args.instance_count)
            .filter_map(|instance| self.alive_list.get(instance))
            .filter_map(|entry| {
                let (a, _) = self.slot(entry.index)?;
                let view_position = self.view_positions.get(entry.index as usize)?;
                Some(QuadInstance {
                    slot: entry.index,
                    corners: kernels::billboard_corners(view_position, a.rotation),
                    tint_and_alpha: a.tint_and_alpha,
                })
            })
            .collect();

        let blend = if uniforms.alpha_blended != 0 {
            BlendMode::AlphaBlend
        } else {
            BlendMode::Additive
        };
        self.last_draw = Some(DrawRecord { args, blend, quads });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::Emitter;
    use std::collections::HashSet;

    fn pool(capacity: u32) -> CpuParticlePool {
        let mut pool = CpuParticlePool::new(&PoolConfig {
            capacity,
            random_field_size: 64,
            random_seed: 1,
        });
        pool.init_free_list();
        pool.reset_particles();
        pool
    }

    fn emit(pool: &mut CpuParticlePool, count: u32, lifespan: f32) {
        let emitter = Emitter {
            particle_lifespan: lifespan,
            ..Default::default()
        };
        pool.emit(&EmitterUniforms::new(&emitter, count));
    }

    fn simulate(pool: &mut CpuParticlePool, dt: f32) {
        let uniforms = SimulationUniforms {
            dt,
            capacity: pool.capacity(),
            ..bytemuck::Zeroable::zeroed()
        };
        pool.simulate(&uniforms, &CpuViews::default());
    }

    #[test]
    fn test_reset_protocol_frees_every_slot() {
        let pool = pool(128);
        assert_eq!(pool.free_count(), 128);
        assert_eq!(pool.alive_count(), 0);
        let slots: HashSet<u32> = pool.free_slots().into_iter().collect();
        assert_eq!(slots, (0..128).collect());
        assert!((0..128).all(|s| !pool.slot(s).unwrap().1.is_alive()));
    }

    #[test]
    fn test_emit_bounded_by_free_count() {
        let mut pool = pool(16);
        emit(&mut pool, 40, 5.0);
        assert_eq!(pool.free_count(), 0);
        let live = (0..16).filter(|&s| pool.slot(s).unwrap().1.is_alive()).count();
        assert_eq!(live, 16);

        // Nothing left to hand out
        emit(&mut pool, 5, 5.0);
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_emitted_particles_start_fresh() {
        let mut pool = pool(8);
        emit(&mut pool, 3, 2.0);
        let spawned: Vec<_> = (0..8)
            .filter_map(|s| pool.slot(s))
            .filter(|(_, b)| b.is_alive())
            .collect();
        assert_eq!(spawned.len(), 3);
        for (a, b) in spawned {
            assert_eq!(b.age, 0.0);
            assert_eq!(b.lifespan, 2.0);
            assert_eq!(a.is_sleeping, 0);
        }
    }

    #[test]
    fn test_simulate_retires_on_lifespan() {
        let mut pool = pool(32);
        emit(&mut pool, 10, 1.0);

        simulate(&mut pool, 0.5);
        assert_eq!(pool.alive_count(), 10);
        assert!(pool.alive_slots().iter().all(|&s| {
            let (_, b) = pool.slot(s).unwrap();
            b.age < b.lifespan
        }));

        // The step that takes the age to the lifespan retires the particle
        simulate(&mut pool, 0.5);
        assert_eq!(pool.alive_count(), 0);
        assert_eq!(pool.free_count(), 32);
        assert_eq!(pool.draw_args().instance_count, 0);
    }

    #[test]
    fn test_sort_orders_back_to_front() {
        let mut pool = pool(64);
        let emitter = Emitter {
            position_variance: Vec3::splat(20.0),
            ..Default::default()
        };
        pool.emit(&EmitterUniforms::new(&emitter, 50));
        simulate(&mut pool, 0.0);
        let before: HashSet<u32> = pool.alive_slots().into_iter().collect();
        pool.sort_alive();

        let entries = pool.alive_entries();
        assert_eq!(entries.len(), 50);
        assert!(entries.windows(2).all(|w| w[0].distance >= w[1].distance));
        let after: HashSet<u32> = entries.iter().map(|e| e.index).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rasterize_uses_draw_args_count() {
        let mut pool = pool(16);
        emit(&mut pool, 4, 5.0);
        simulate(&mut pool, 0.1);
        pool.rasterize(
            &RasterUniforms {
                alpha_blended: 0,
                ..bytemuck::Zeroable::zeroed()
            },
            &CpuViews::default(),
        );

        let draw = pool.last_draw().unwrap();
        assert_eq!(draw.args.instance_count, 4);
        assert_eq!(draw.args.index_count, 6);
        assert_eq!(draw.quads.len(), 4);
        assert_eq!(draw.blend, BlendMode::Additive);
    }
}
