use crate::config::{ParticleConfig, SimulationConfig};
use crate::gpu::buffer_layouts::{
    EmitterUniforms, FrameUniforms, RasterUniforms, SimulationUniforms,
};
use crate::particles::emitter::Emitter;
use crate::particles::stages::ParticleStages;

/// Lifecycle of a slot pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Resources exist, contents undefined
    Uninitialized,
    /// Every slot free and dead
    Initialized,
    /// At least one frame has run since the last reset
    Running,
}

/// Frame statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameStats {
    pub frames_rendered: u64,
    pub resets: u64,
    /// Particles requested from the Emit stage last frame
    pub requested_last_frame: u32,
    pub requested_total: u64,
}

/// Drives one emitter's slot pool through the per-frame stage sequence.
///
/// A frame is `update` (host-side budget) followed by `render` (device
/// stages). The backend decides where the stages run.
pub struct ParticleSystem<S: ParticleStages> {
    stages: S,
    state: PoolState,
    simulation: SimulationConfig,
    soft_particle_distance: f32,
    stats: FrameStats,
}

impl<S: ParticleStages> ParticleSystem<S> {
    /// Take ownership of a freshly created pool and run the reset protocol
    pub fn new(stages: S, config: &ParticleConfig) -> Self {
        let mut system = Self {
            stages,
            state: PoolState::Uninitialized,
            simulation: config.simulation.clone(),
            soft_particle_distance: config.render.soft_particle_distance,
            stats: FrameStats::default(),
        };
        system.reset();
        system
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn capacity(&self) -> u32 {
        self.stages.capacity()
    }

    pub fn stages(&self) -> &S {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut S {
        &mut self.stages
    }

    pub fn into_stages(self) -> S {
        self.stages
    }

    /// Free every slot and kill every particle. Idempotent.
    pub fn reset(&mut self) {
        self.stages.init_free_list();
        self.stages.reset_particles();
        self.state = PoolState::Initialized;
        self.stats.resets += 1;
        log::info!(
            "[ParticleSystem] Pool of {} slots reset",
            self.stages.capacity()
        );
    }

    /// Reset and hand the work to the device right away
    pub fn clear(&mut self) {
        self.reset();
        self.stages.flush();
    }

    /// Host half of a frame: advance the emitter's budget
    pub fn update(&mut self, dt: f32, emitter: &mut Emitter) {
        emitter.update_budget(dt);
    }

    /// Device half of a frame.
    ///
    /// Honours a pending reset, emits the budgeted particles, simulates,
    /// optionally sorts, and draws into the supplied views.
    pub fn render(&mut self, emitter: &mut Emitter, frame: &FrameUniforms, views: S::Views<'_>) {
        if emitter.reset {
            self.reset();
            emitter.reset = false;
        }

        let requested = emitter.budget.take();
        if requested > 0 {
            self.stages
                .emit(&EmitterUniforms::new(emitter, requested));
        }

        let capacity = self.stages.capacity();
        self.stages.simulate(
            &SimulationUniforms::new(frame, emitter, &self.simulation, capacity),
            &views,
        );

        if emitter.sort {
            self.stages.sort_alive();
        }

        self.stages.rasterize(
            &RasterUniforms::new(frame, emitter, self.soft_particle_distance),
            &views,
        );
        self.stages.flush();

        self.state = PoolState::Running;
        self.stats.frames_rendered += 1;
        self.stats.requested_last_frame = requested;
        self.stats.requested_total += requested as u64;
    }
}
