/// Non-linear [0, 1] scene depth, laid out like a Depth32Float target
#[derive(Debug, Clone)]
pub struct DepthField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DepthField {
    /// Field with every pixel at `depth`; 1.0 is the far plane
    pub fn uniform(width: u32, height: u32, depth: f32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            values: vec![depth; width.max(1) as usize * height.max(1) as usize],
        }
    }

    /// Field whose pixels all hold the device depth of a surface
    /// `view_distance` in front of the camera
    pub fn at_view_distance(width: u32, height: u32, view_distance: f32, near: f32, far: f32) -> Self {
        Self::uniform(width, height, device_depth(view_distance, near, far))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn load(&self, x: u32, y: u32) -> f32 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.values[(y * self.width + x) as usize]
    }

    pub fn store(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.width && y < self.height {
            self.values[(y * self.width + x) as usize] = depth;
        }
    }
}

/// View-space distance of a device depth value
pub fn linear_depth(depth: f32, near: f32, far: f32) -> f32 {
    far * near / (far - depth * (far - near))
}

/// Inverse of [`linear_depth`]
pub fn device_depth(view_distance: f32, near: f32, far: f32) -> f32 {
    (far - far * near / view_distance) / (far - near)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_round_trip() {
        let (near, far) = (0.1, 1000.0);
        for distance in [0.5f32, 1.0, 25.0, 100.0] {
            let d = device_depth(distance, near, far);
            assert!((0.0..=1.0).contains(&d));
            let back = linear_depth(d, near, far);
            assert!((back - distance).abs() / distance < 1e-3, "{} -> {}", distance, back);
        }
        assert!((linear_depth(0.0, near, far) - near).abs() < 1e-6);
        assert!((linear_depth(1.0, near, far) - far).abs() / far < 1e-3);
    }
}
