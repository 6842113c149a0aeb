use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::EmitterParameters;

/// Fractional-accumulation state that turns a continuous emission rate into
/// whole particles per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmissionBudget {
    /// Total time the emitter has been updated for
    pub elapsed_time: f32,
    /// Fractional carry between frames
    pub accumulation: f32,
    /// Particles to spawn in the next Emit dispatch, zeroed once consumed
    pub number_to_emit: u32,
}

impl EmissionBudget {
    /// Advance the budget by `dt` seconds at `rate` particles per second.
    ///
    /// `number_to_emit` is only rewritten when a whole particle has
    /// accumulated; a rate of zero or less never emits.
    pub fn update(&mut self, dt: f32, rate: f32) {
        self.elapsed_time += dt;
        if rate > 0.0 {
            self.accumulation += rate * dt;
            if self.accumulation > 1.0 {
                let whole = self.accumulation.trunc();
                self.number_to_emit = whole as u32;
                self.accumulation -= whole;
            }
        }
    }

    /// Hand the pending count to the Emit stage and zero it
    pub fn take(&mut self) -> u32 {
        std::mem::take(&mut self.number_to_emit)
    }
}

/// Per-emitter configuration record, supplied once per frame.
///
/// Values are trusted as given: a negative lifespan or size is the editor's
/// problem, not the pipeline's.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Emitter {
    pub position: Vec3,
    pub velocity: Vec3,
    pub position_variance: Vec3,
    pub velocity_variance: f32,
    pub mass: f32,
    pub particle_lifespan: f32,
    pub start_size: f32,
    pub end_size: f32,
    pub particles_per_second: f32,
    pub collision_thickness: f32,
    pub collisions_enabled: bool,
    pub alpha_blended: bool,
    pub sort: bool,
    pub pause: bool,
    /// Observed at the start of a frame; cleared once the pool is reset
    pub reset: bool,
    #[serde(skip)]
    pub budget: EmissionBudget,
}

impl Default for Emitter {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::new(0.0, 5.0, 0.0),
            position_variance: Vec3::ZERO,
            velocity_variance: 1.0,
            mass: 1.0,
            particle_lifespan: 5.0,
            start_size: 10.0,
            end_size: 1.0,
            particles_per_second: 100.0,
            collision_thickness: 40.0,
            collisions_enabled: false,
            alpha_blended: true,
            sort: false,
            pause: false,
            reset: true,
            budget: EmissionBudget::default(),
        }
    }
}

impl Emitter {
    /// Build a fresh emitter from a configuration preset
    pub fn from_parameters(parameters: &EmitterParameters) -> Self {
        Self {
            reset: true,
            budget: EmissionBudget::default(),
            ..parameters.settings.clone()
        }
    }

    /// Integrate the emission budget for this frame. Paused emitters hold.
    pub fn update_budget(&mut self, dt: f32) {
        if self.pause {
            return;
        }
        self.budget.update(dt, self.particles_per_second);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_emitted(rate: f32, steps: &[f32]) -> u32 {
        let mut budget = EmissionBudget::default();
        let mut total = 0;
        for &dt in steps {
            budget.update(dt, rate);
            total += budget.take();
        }
        total
    }

    #[test]
    fn test_budget_converges_regardless_of_step_size() {
        let rate = 37.0;
        let duration = 4.0;

        for steps in [10usize, 64, 240, 1000] {
            let dt = duration / steps as f32;
            let total = total_emitted(rate, &vec![dt; steps]) as f32;
            let expected = rate * duration;
            assert!(
                (total - expected).abs() <= 1.0 + 1e-3,
                "{} steps emitted {} (expected {})",
                steps,
                total,
                expected
            );
        }
    }

    #[test]
    fn test_budget_with_jittered_steps() {
        // Same total time as 2 seconds, uneven chunks
        let steps = [0.016, 0.033, 0.2, 0.001, 0.75, 0.5, 0.3, 0.2];
        let total_time: f32 = steps.iter().sum();
        let total = total_emitted(60.0, &steps) as f32;
        assert!((total - 60.0 * total_time).abs() <= 1.0 + 1e-3);
    }

    #[test]
    fn test_ten_per_second_for_one_second() {
        let total = total_emitted(10.0, &[0.05; 20]);
        assert!((9..=11).contains(&total), "emitted {}", total);
        assert!(total > 0);
        assert!(total <= (10.0f32 * 0.05 * 20.0).ceil() as u32 + 1);
    }

    #[test]
    fn test_no_emission_for_non_positive_rate() {
        assert_eq!(total_emitted(0.0, &[0.5; 10]), 0);
        assert_eq!(total_emitted(-5.0, &[0.5; 10]), 0);

        let mut budget = EmissionBudget::default();
        budget.update(1.0, -3.0);
        assert_eq!(budget.elapsed_time, 1.0);
        assert_eq!(budget.accumulation, 0.0);
    }

    #[test]
    fn test_fraction_is_carried() {
        let mut budget = EmissionBudget::default();
        budget.update(1.0, 2.5);
        assert_eq!(budget.number_to_emit, 2);
        assert!((budget.accumulation - 0.5).abs() < 1e-6);
        assert_eq!(budget.take(), 2);
        assert_eq!(budget.number_to_emit, 0);
    }

    #[test]
    fn test_paused_emitter_holds_budget() {
        let mut emitter = Emitter {
            pause: true,
            ..Default::default()
        };
        emitter.update_budget(1.0);
        assert_eq!(emitter.budget, EmissionBudget::default());

        emitter.pause = false;
        emitter.update_budget(1.0);
        assert_eq!(emitter.budget.number_to_emit, 100);
    }
}
