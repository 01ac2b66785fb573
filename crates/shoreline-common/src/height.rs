//! Analytic beach height function and the CPU reference height field.
//!
//! The GPU baker evaluates the same function in WGSL; [`HeightField::bake_reference`]
//! exists so the host and tests can check the baked texture texel by texel.

use glam::UVec2;

use crate::domain::DomainConfig;
use crate::error::ConfigError;
use crate::layout::{texel_center_uv, uv_to_texel};

/// One height-field texel: the surface height and the plain beach height
/// beneath any raised feature.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeightSample {
    /// Final surface height (texture channel r)
    pub height: f32,
    /// Beach-slope height ignoring the feature (texture channel g)
    pub default_height: f32,
}

impl HeightSample {
    /// Height of the feature above the beach slope; positive only on the raised feature.
    #[must_use]
    pub fn feature_lift(&self) -> f32 {
        self.height - self.default_height
    }

    /// Texel value as stored in the float texture.
    #[must_use]
    pub const fn to_texel(self) -> [f32; 4] {
        [self.height, self.default_height, 0.0, 1.0]
    }

    /// Reads a stored texel.
    #[must_use]
    pub const fn from_texel(texel: [f32; 4]) -> Self {
        Self {
            height: texel[0],
            default_height: texel[1],
        }
    }
}

/// Evaluates the beach/atoll height at world `(x, z)`.
#[must_use]
pub fn evaluate(config: &DomainConfig, x: f32, z: f32) -> HeightSample {
    let default_height = config.slope * -x - config.offset;
    let height = if config.in_feature_region(x) {
        let a = (x - config.feature_center_x).cos();
        let b = (z - config.feature_center_z).cos();
        default_height.max(a + b - 2.0)
    } else {
        default_height
    };
    HeightSample {
        height,
        default_height,
    }
}

/// Square grid of height samples, written once.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    resolution: u32,
    config: DomainConfig,
    samples: Vec<HeightSample>,
}

impl HeightField {
    /// Bakes the height function on the CPU.
    ///
    /// Texel `(i, j)` is evaluated at its centre, matching a full-screen raster pass.
    pub fn bake_reference(config: &DomainConfig, resolution: u32) -> Result<Self, ConfigError> {
        if resolution == 0 {
            return Err(ConfigError::InvalidResolution(resolution));
        }
        config.validate()?;

        let mut samples = Vec::with_capacity((resolution as usize).pow(2));
        for j in 0..resolution {
            for i in 0..resolution {
                let (u, v) = texel_center_uv(UVec2::new(i, j), resolution);
                samples.push(evaluate(config, config.u_to_x(u), config.v_to_z(v)));
            }
        }

        Ok(Self {
            resolution,
            config: *config,
            samples,
        })
    }

    /// Wraps texels read back from the GPU.
    ///
    /// # Panics
    /// Panics if `texels.len()` is not `resolution²`.
    #[must_use]
    pub fn from_texels(config: &DomainConfig, resolution: u32, texels: &[[f32; 4]]) -> Self {
        assert_eq!(
            texels.len(),
            (resolution as usize).pow(2),
            "Height texel count mismatch"
        );
        Self {
            resolution,
            config: *config,
            samples: texels.iter().copied().map(HeightSample::from_texel).collect(),
        }
    }

    /// Edge length in texels.
    #[must_use]
    pub const fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Domain the field was baked for.
    #[must_use]
    pub const fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// All samples, row-major.
    #[must_use]
    pub fn samples(&self) -> &[HeightSample] {
        &self.samples
    }

    /// Sample at a texel.
    #[must_use]
    pub fn texel(&self, texel: UVec2) -> HeightSample {
        self.samples[(texel.y * self.resolution + texel.x) as usize]
    }

    /// World `(x, z)` a texel was evaluated at.
    #[must_use]
    pub fn texel_world(&self, texel: UVec2) -> (f32, f32) {
        let (u, v) = texel_center_uv(texel, self.resolution);
        (self.config.u_to_x(u), self.config.v_to_z(v))
    }

    /// Nearest-texel sample at normalized coordinates, clamped to the edge.
    #[must_use]
    pub fn sample_uv(&self, u: f32, v: f32) -> HeightSample {
        self.texel(uv_to_texel(u, v, self.resolution))
    }

    /// Nearest-texel sample at a world position; outside the domain reads the boundary.
    #[must_use]
    pub fn sample_world(&self, x: f32, z: f32) -> HeightSample {
        let (u, v) = self.config.world_to_uv(x, z);
        self.sample_uv(u, v)
    }

    /// Samples as texture texels.
    #[must_use]
    pub fn to_texels(&self) -> Vec<[f32; 4]> {
        self.samples.iter().map(|s| s.to_texel()).collect()
    }

    /// Lowest and highest surface height.
    #[must_use]
    pub fn height_range(&self) -> (f32, f32) {
        self.samples
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.height), hi.max(s.height))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_scenario_heights_through_baked_field() {
        let config = DomainConfig::default();
        let field = HeightField::bake_reference(&config, 512).expect("bake");

        let origin = field.sample_world(0.0, 0.0);
        assert!((origin.height - -0.25).abs() < 1e-2, "{origin:?}");

        let peak = field.sample_world(3.0, 3.0);
        assert!(peak.height.abs() < 1e-2, "{peak:?}");
        assert!(peak.height >= peak.default_height);
    }

    #[test]
    fn test_scenario_heights() {
        let config = DomainConfig::default();

        let origin = evaluate(&config, 0.0, 0.0);
        assert!((origin.height - -0.25).abs() < EPS);
        assert_eq!(origin.feature_lift(), 0.0);

        let center = evaluate(&config, 3.0, 3.0);
        assert!((center.default_height - -0.55).abs() < EPS);
        assert!(center.height.abs() < EPS);
        assert!(center.feature_lift() > 0.5);
    }

    #[test]
    fn test_feature_bounds_inclusive() {
        let config = DomainConfig::default();
        // x = 4 is inside: cos(1) - 1 ≈ -0.46 beats the beach at -0.65
        let edge = evaluate(&config, 4.0, 3.0);
        assert!((edge.height - (1.0f32.cos() - 1.0)).abs() < EPS);
        assert!(edge.feature_lift() > 0.0);

        let outside = evaluate(&config, 4.01, 3.0);
        assert_eq!(outside.height, outside.default_height);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        assert_eq!(
            HeightField::bake_reference(&DomainConfig::default(), 0),
            Err(ConfigError::InvalidResolution(0))
        );
    }

    #[test]
    fn test_bake_idempotent() {
        let config = DomainConfig::default();
        let a = HeightField::bake_reference(&config, 64).expect("bake");
        let b = HeightField::bake_reference(&config, 64).expect("bake");
        assert_eq!(a, b);
    }

    #[test]
    fn test_baked_texels_match_function() {
        let config = DomainConfig::default();
        let field = HeightField::bake_reference(&config, 128).expect("bake");
        for j in 0..128 {
            for i in 0..128 {
                let texel = UVec2::new(i, j);
                let (x, z) = field.texel_world(texel);
                let sample = field.texel(texel);
                let beach = config.slope * -x - config.offset;
                assert!((sample.default_height - beach).abs() < EPS);
                assert!(sample.height >= sample.default_height);
                if !config.in_feature_region(x) {
                    assert!((sample.height - beach).abs() < EPS);
                }
            }
        }
    }

    #[test]
    fn test_sample_world_clamps_at_boundary() {
        let config = DomainConfig::default();
        let field = HeightField::bake_reference(&config, 32).expect("bake");
        assert_eq!(
            field.sample_world(-100.0, 0.0),
            field.texel(UVec2::new(0, 16))
        );
        assert_eq!(
            field.sample_world(100.0, 100.0),
            field.texel(UVec2::new(31, 31))
        );
    }

    #[test]
    fn test_texel_round_trip() {
        let config = DomainConfig::default();
        let field = HeightField::bake_reference(&config, 16).expect("bake");
        let copy = HeightField::from_texels(&config, 16, &field.to_texels());
        assert_eq!(field, copy);
    }

    proptest! {
        #[test]
        fn prop_height_never_below_beach(x in -5.0f32..5.0, z in -5.0f32..5.0) {
            let config = DomainConfig::default();
            let sample = evaluate(&config, x, z);
            prop_assert!(sample.height >= sample.default_height);
            let beach = config.slope * -x - config.offset;
            prop_assert!((sample.default_height - beach).abs() < EPS);
            if config.in_feature_region(x) {
                let feature = (x - 3.0).cos() + (z - 3.0).cos() - 2.0;
                prop_assert_eq!(sample.height, beach.max(feature));
            } else {
                prop_assert_eq!(sample.height, beach);
            }
        }
    }
}
