//! Host configuration.
//!
//! Provides the pipeline parameters plus the headless run, camera and
//! verification settings. Configuration can be loaded from and saved to a
//! TOML file.

use serde::{Deserialize, Serialize};
use shoreline_common::{
    DomainConfig, SeedParams, ShorelineResult, SimulationParams, TexelPrecision,
};
use shoreline_kernel::PipelineSettings;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "shoreline.toml";

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Pipeline Settings ===
    /// Domain rectangle and height parameters
    pub domain: DomainConfig,
    /// Height-field edge length in texels
    pub height_resolution: u32,
    /// Particle lattice edge length
    pub grid: u32,
    /// Particle texture edge length (None = smallest that fits)
    pub texture_size: Option<u32>,
    /// Lattice seeding constants
    pub seed: SeedParams,
    /// Update rule
    pub simulation: SimulationParams,
    /// Requested float precision
    pub precision: TexelPrecision,
    /// Precision used when the requested one is unsupported (None = fail)
    pub fallback_precision: Option<TexelPrecision>,

    // === Run Settings ===
    /// Frames to run before exiting
    pub frames: u64,

    // === Presentation Settings ===
    /// Offscreen color target width in pixels
    pub render_width: u32,
    /// Offscreen color target height in pixels
    pub render_height: u32,
    /// Particle sphere diameter
    pub particle_diameter: f32,
    /// Camera position
    pub camera_eye: [f32; 3],
    /// Camera look-at point
    pub camera_target: [f32; 3],

    // === Debug Settings ===
    /// Frames between GPU-vs-reference checks (0 = disabled)
    pub verify_every: u64,
    /// Largest per-channel difference accepted by verification
    pub verify_tolerance: f32,
    /// Write the baked height field here as a PNG
    pub height_snapshot: Option<PathBuf>,
    /// Enable GPU validation layers
    pub gpu_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let pipeline = PipelineSettings::default();
        Self {
            // Pipeline
            domain: pipeline.domain,
            height_resolution: pipeline.height_resolution,
            grid: pipeline.grid,
            texture_size: pipeline.texture_size,
            seed: pipeline.seed,
            simulation: pipeline.simulation,
            precision: pipeline.precision,
            fallback_precision: pipeline.fallback_precision,

            // Run
            frames: 600,

            // Presentation
            render_width: 1280,
            render_height: 720,
            particle_diameter: pipeline.particle_diameter,
            camera_eye: [0.0, 5.0, -10.0],
            camera_target: [0.0, 0.0, 0.0],

            // Debug
            verify_every: 60,
            verify_tolerance: 0.05,
            height_snapshot: None,
            gpu_validation: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamps presentation values and runs every pipeline check.
    ///
    /// Pipeline parameters are rejected rather than clamped; a degenerate
    /// domain has no sensible nearby value. The render size upper bound
    /// depends on the device and is checked once the context exists.
    pub fn validate(&mut self) -> ShorelineResult<()> {
        self.render_width = self.render_width.max(1);
        self.render_height = self.render_height.max(1);
        if !self.verify_tolerance.is_finite() || self.verify_tolerance < 0.0 {
            warn!(
                "Invalid verify_tolerance {}, using default",
                self.verify_tolerance
            );
            self.verify_tolerance = Self::default().verify_tolerance;
        }

        self.pipeline_settings().validate()
    }

    /// Pipeline parameters.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            domain: self.domain,
            height_resolution: self.height_resolution,
            grid: self.grid,
            texture_size: self.texture_size,
            seed: self.seed,
            simulation: self.simulation,
            precision: self.precision,
            fallback_precision: self.fallback_precision,
            particle_diameter: self.particle_diameter,
        }
    }

    /// Render target aspect ratio.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.render_width as f32 / self.render_height.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoreline_common::{ConfigError, ShorelineError, SurfacePolicy};

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.grid, 10);
        assert_eq!(config.height_resolution, 512);
        assert_eq!(config.frames, 600);
        assert_eq!(config.simulation.policy, SurfacePolicy::Snap);
        assert!(config.texture_size.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config").join(CONFIG_FILE);

        let mut config = EngineConfig::default();
        config.grid = 6;
        config.simulation.policy = SurfacePolicy::Teleport { height: 10.0 };
        config.fallback_precision = Some(TexelPrecision::Half);
        config.height_snapshot = Some(PathBuf::from("height.png"));

        config.save_to(&path).expect("save");
        let loaded = EngineConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "grid = 4\nframes = 10\n\n[simulation.policy]\nmode = \"lift\"\nlift = 0.05\n",
        )
        .expect("write");

        let config = EngineConfig::load_from(&path);
        assert_eq!(config.grid, 4);
        assert_eq!(config.frames, 10);
        assert_eq!(config.simulation.policy, SurfacePolicy::Lift { lift: 0.05 });
        assert_eq!(config.height_resolution, 512);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EngineConfig::load_from("/nonexistent/shoreline.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "grid = \"ten\"").expect("write");
        assert_eq!(EngineConfig::load_from(&path), EngineConfig::default());
    }

    #[test]
    fn test_validate_rejects_degenerate_domain() {
        let mut config = EngineConfig::default();
        config.domain.max_x = config.domain.min_x;
        assert!(matches!(
            config.validate(),
            Err(ShorelineError::Config(ConfigError::DegenerateDomain { .. }))
        ));
    }

    #[test]
    fn test_validate_clamps_presentation() {
        let mut config = EngineConfig::default();
        config.render_width = 0;
        config.verify_tolerance = f32::NAN;
        assert!(config.validate().is_ok());
        assert_eq!(config.render_width, 1);
        assert_eq!(config.verify_tolerance, 0.05);
    }

    #[test]
    fn test_validate_keeps_large_render_size() {
        let mut config = EngineConfig::default();
        config.render_width = 20_000;
        assert!(config.validate().is_ok());
        assert_eq!(config.render_width, 20_000);
    }
}
