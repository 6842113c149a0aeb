use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{EngineError, EngineResult};
use crate::particles::Emitter;

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(ConfigFormat::Json),
            Some("toml") => Some(ConfigFormat::Toml),
            _ => None,
        }
    }
}

/// Top-level particle configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub pool: PoolConfig,
    pub simulation: SimulationConfig,
    pub render: RenderConfig,
    /// Emitter presets that tools can instantiate by name
    pub emitters: Vec<EmitterParameters>,
}

/// Slot pool and random field sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of particle slots
    pub capacity: u32,
    /// Width and height of the random field texture
    pub random_field_size: u32,
    pub random_seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: constants::pool::DEFAULT_CAPACITY,
            random_field_size: constants::random_field::DEFAULT_SIZE,
            random_seed: constants::random_field::DEFAULT_SEED,
        }
    }
}

/// Ambient forces and collision response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub gravity: Vec3,
    pub restitution: f32,
    pub sleep_speed: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::from_array(constants::simulation::DEFAULT_GRAVITY),
            restitution: constants::simulation::DEFAULT_RESTITUTION,
            sleep_speed: constants::simulation::DEFAULT_SLEEP_SPEED,
        }
    }
}

/// Colour target formats the rasterizer can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
    Rgba16Float,
}

impl ColorFormat {
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            ColorFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            ColorFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// View-space distance over which particles fade into scene geometry
    pub soft_particle_distance: f32,
    pub color_format: ColorFormat,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            soft_particle_distance: constants::render::DEFAULT_SOFT_PARTICLE_DISTANCE,
            color_format: ColorFormat::Rgba8UnormSrgb,
        }
    }
}

/// Named emitter preset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterParameters {
    pub name: String,
    #[serde(default)]
    pub texture_path: Option<PathBuf>,
    #[serde(flatten)]
    pub settings: Emitter,
}

impl ParticleConfig {
    /// Load a configuration file, picking the parser from the extension
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| EngineError::UnknownConfigFormat {
            path: path.display().to_string(),
        })?;
        let raw = std::fs::read_to_string(path)?;

        let config = match format {
            ConfigFormat::Toml => Self::from_toml_str(&raw)?,
            ConfigFormat::Json => Self::from_json_str(&raw)?,
        };
        log::info!(
            "Loaded particle config from {} ({} emitter presets)",
            path.display(),
            config.emitters.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> EngineResult<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make resource creation impossible.
    ///
    /// Per-frame emitter values are not checked here; keeping them sane is
    /// the job of whoever edits the emitter.
    pub fn validate(&self) -> EngineResult<()> {
        if self.pool.capacity == 0 {
            return Err(EngineError::InvalidConfig {
                field: "pool.capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pool.random_field_size == 0 {
            return Err(EngineError::InvalidConfig {
                field: "pool.random_field_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Find an emitter preset by name
    pub fn emitter(&self, name: &str) -> Option<&EmitterParameters> {
        self.emitters.iter().find(|preset| preset.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = ParticleConfig::from_toml_str("").unwrap();
        assert_eq!(config.pool.capacity, 400 * 1024);
        assert_eq!(config.pool.random_field_size, 1024);
        assert_eq!(config.simulation.gravity, Vec3::new(0.0, -9.81, 0.0));
        assert!(config.emitters.is_empty());
    }

    #[test]
    fn test_emitter_preset_fills_defaults() {
        let raw = r#"
            [pool]
            capacity = 2048

            [[emitters]]
            name = "sparks"
            particles_per_second = 250.0
            sort = true
            velocity = [0.0, 12.0, 0.0]
        "#;
        let config = ParticleConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.pool.capacity, 2048);

        let sparks = config.emitter("sparks").unwrap();
        assert_eq!(sparks.settings.particles_per_second, 250.0);
        assert!(sparks.settings.sort);
        assert_eq!(sparks.settings.velocity, Vec3::new(0.0, 12.0, 0.0));
        // Untouched fields keep the component defaults
        assert_eq!(sparks.settings.particle_lifespan, 5.0);
        assert!(sparks.settings.alpha_blended);
        assert!(sparks.texture_path.is_none());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ParticleConfig::from_toml_str("[pool]\ncapacity = 0\n");
        assert!(matches!(result, Err(EngineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), None);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("particles.json");
        std::fs::write(
            &path,
            r#"{ "render": { "color_format": "bgra8_unorm_srgb" },
                 "emitters": [ { "name": "smoke", "mass": 0.5 } ] }"#,
        )
        .unwrap();

        let config = ParticleConfig::load(&path).unwrap();
        assert_eq!(config.render.color_format, ColorFormat::Bgra8UnormSrgb);
        assert_eq!(config.emitter("smoke").unwrap().settings.mass, 0.5);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config = ParticleConfig::from_toml_str(include_str!("../config/particles.toml")).unwrap();
        assert_eq!(config.emitters.len(), 2);
        assert!(config.emitter("fountain").unwrap().settings.collisions_enabled);
        assert!(!config.emitter("embers").unwrap().settings.alpha_blended);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = ParticleConfig::load("particles.ini");
        assert!(matches!(result, Err(EngineError::UnknownConfigFormat { .. })));
    }
}
