//! Seeded field of random vectors that Emit samples for spawn jitter

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Square grid of RGBA texels, every component uniform in [-1, 1).
///
/// The same texels back the GPU texture and the CPU reference device, so both
/// spawn identical particles for identical emitter state.
#[derive(Debug, Clone)]
pub struct RandomField {
    size: u32,
    texels: Vec<[f32; 4]>,
}

impl RandomField {
    pub fn generate(size: u32, seed: u64) -> Self {
        let size = size.max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let texels = (0..size as usize * size as usize)
            .map(|_| {
                [
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ]
            })
            .collect();

        log::debug!("[RandomField] Generated {}x{} field (seed {:#x})", size, size, seed);
        Self { size, texels }
    }

    /// Width and height in texels
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let x = x % self.size;
        let y = y % self.size;
        Vec4::from_array(self.texels[(y * self.size + x) as usize])
    }

    /// Row selected by the fractional part of the emitter's elapsed time
    pub fn row_for_time(&self, elapsed_time: f32) -> u32 {
        let fraction = elapsed_time - elapsed_time.floor();
        ((fraction * self.size as f32) as u32).min(self.size - 1)
    }

    /// Position and velocity jitter for one emission lane.
    ///
    /// Lane `i` reads columns `i` and `i + 1` of the row for `elapsed_time`.
    pub fn emission_jitter(&self, lane: u32, elapsed_time: f32) -> (Vec3, Vec3) {
        let row = self.row_for_time(elapsed_time);
        let position = self.texel(lane % self.size, row).truncate();
        let velocity = self.texel((lane + 1) % self.size, row).truncate();
        (position, velocity)
    }

    /// Raw texel data in Rgba32Float layout
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_in_range() {
        let field = RandomField::generate(32, 7);
        for y in 0..32 {
            for x in 0..32 {
                let t = field.texel(x, y);
                for c in t.to_array() {
                    assert!((-1.0..1.0).contains(&c), "component {} out of range", c);
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_field() {
        let a = RandomField::generate(16, 42);
        let b = RandomField::generate(16, 42);
        let c = RandomField::generate(16, 43);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_row_wraps_with_time() {
        let field = RandomField::generate(8, 1);
        assert_eq!(field.row_for_time(0.0), 0);
        assert_eq!(field.row_for_time(0.5), 4);
        assert_eq!(field.row_for_time(3.5), 4);
        assert_eq!(field.row_for_time(0.999_99), 7);
    }

    #[test]
    fn test_adjacent_lanes_share_a_column() {
        let field = RandomField::generate(8, 9);
        let (_, velocity_0) = field.emission_jitter(0, 0.25);
        let (position_1, _) = field.emission_jitter(1, 0.25);
        assert_eq!(velocity_0, position_1);

        // Lanes wrap around the row
        let (wrapped, _) = field.emission_jitter(8, 0.25);
        let (first, _) = field.emission_jitter(0, 0.25);
        assert_eq!(wrapped, first);
    }
}
