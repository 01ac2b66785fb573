//! World domain and analytic terrain parameters.
//!
//! The domain is the world-space rectangle covered by the height field. Every
//! component that maps between world `x`/`z` and normalized texture
//! coordinates goes through [`DomainConfig`] so the baker, the simulation step
//! and any ground surface agree on the same mapping.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Domain rectangle plus the analytic height-function constants.
///
/// Immutable for the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Lower world X bound
    pub min_x: f32,
    /// Upper world X bound
    pub max_x: f32,
    /// Lower world Z bound
    pub min_z: f32,
    /// Upper world Z bound
    pub max_z: f32,
    /// Beach slope along -X
    pub slope: f32,
    /// Vertical offset subtracted from the slope plane (how much shoreline is visible)
    pub offset: f32,
    /// Feature (atoll) region lower X bound, inclusive
    pub feature_x_min: f32,
    /// Feature (atoll) region upper X bound, inclusive
    pub feature_x_max: f32,
    /// Feature bump centre X
    pub feature_center_x: f32,
    /// Feature bump centre Z
    pub feature_center_z: f32,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            min_x: -5.0,
            max_x: 5.0,
            min_z: -5.0,
            max_z: 5.0,
            slope: 0.1,
            offset: 0.25,
            feature_x_min: 2.0,
            feature_x_max: 4.0,
            feature_center_x: 3.0,
            feature_center_z: 3.0,
        }
    }
}

impl DomainConfig {
    /// Checks bounds ordering and finiteness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("min_x", self.min_x),
            ("max_x", self.max_x),
            ("min_z", self.min_z),
            ("max_z", self.max_z),
            ("slope", self.slope),
            ("offset", self.offset),
            ("feature_x_min", self.feature_x_min),
            ("feature_x_max", self.feature_x_max),
            ("feature_center_x", self.feature_center_x),
            ("feature_center_z", self.feature_center_z),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NonFinite(name));
        }

        if self.min_x >= self.max_x {
            return Err(ConfigError::DegenerateDomain {
                axis: "x",
                min: self.min_x,
                max: self.max_x,
            });
        }
        if self.min_z >= self.max_z {
            return Err(ConfigError::DegenerateDomain {
                axis: "z",
                min: self.min_z,
                max: self.max_z,
            });
        }
        // Finite bounds can still span past f32::MAX
        if !(self.max_x - self.min_x).is_finite() {
            return Err(ConfigError::NonFinite("max_x - min_x"));
        }
        if !(self.max_z - self.min_z).is_finite() {
            return Err(ConfigError::NonFinite("max_z - min_z"));
        }
        if self.feature_x_min > self.feature_x_max {
            return Err(ConfigError::InvertedFeatureRegion {
                min: self.feature_x_min,
                max: self.feature_x_max,
            });
        }
        Ok(())
    }

    /// World X for normalized `u`.
    #[must_use]
    pub fn u_to_x(&self, u: f32) -> f32 {
        lerp(self.min_x, self.max_x, u)
    }

    /// World Z for normalized `v`.
    #[must_use]
    pub fn v_to_z(&self, v: f32) -> f32 {
        lerp(self.min_z, self.max_z, v)
    }

    /// Normalized coordinates for a world position, clamped to `[0, 1]`.
    ///
    /// Positions outside the rectangle read the boundary sample.
    #[must_use]
    pub fn world_to_uv(&self, x: f32, z: f32) -> (f32, f32) {
        let u = (x - self.min_x) / (self.max_x - self.min_x);
        let v = (z - self.min_z) / (self.max_z - self.min_z);
        (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
    }

    /// Whether `x` lies in the raised feature band.
    #[must_use]
    pub fn in_feature_region(&self, x: f32) -> bool {
        x >= self.feature_x_min && x <= self.feature_x_max
    }
}

/// Matches the GLSL `mix` the shaders use, so CPU and GPU round the same way.
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// GPU-compatible domain uniform.
/// Layout: 48 bytes (10 floats + 2 padding).
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct DomainUniform {
    /// min_x, max_x, min_z, max_z
    pub bounds: [f32; 4],
    /// slope, offset, feature_x_min, feature_x_max
    pub shape: [f32; 4],
    /// feature_center_x, feature_center_z, padding
    pub center: [f32; 4],
}

impl From<&DomainConfig> for DomainUniform {
    fn from(config: &DomainConfig) -> Self {
        Self {
            bounds: [config.min_x, config.max_x, config.min_z, config.max_z],
            shape: [
                config.slope,
                config.offset,
                config.feature_x_min,
                config.feature_x_max,
            ],
            center: [config.feature_center_x, config.feature_center_z, 0.0, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(DomainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_degenerate_domain_rejected() {
        let config = DomainConfig {
            min_x: 1.0,
            max_x: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DegenerateDomain { axis: "x", .. })
        ));

        let config = DomainConfig {
            min_z: 3.0,
            max_z: -3.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DegenerateDomain { axis: "z", .. })
        ));
    }

    #[test]
    fn test_overflowing_span_rejected() {
        let config = DomainConfig {
            min_x: -3e38,
            max_x: 3e38,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite("max_x - min_x"))
        ));

        let config = DomainConfig {
            min_z: -3e38,
            max_z: 3e38,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonFinite("max_z - min_z"))
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let config = DomainConfig {
            slope: f32::NAN,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonFinite("slope")));
    }

    #[test]
    fn test_inverted_feature_rejected() {
        let config = DomainConfig {
            feature_x_min: 4.0,
            feature_x_max: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedFeatureRegion { .. })
        ));
    }

    #[test]
    fn test_uv_mapping() {
        let config = DomainConfig::default();
        assert_eq!(config.u_to_x(0.0), -5.0);
        assert_eq!(config.u_to_x(1.0), 5.0);
        assert_eq!(config.v_to_z(0.5), 0.0);
        assert_eq!(config.world_to_uv(0.0, 0.0), (0.5, 0.5));
    }

    #[test]
    fn test_world_to_uv_clamps() {
        let config = DomainConfig::default();
        assert_eq!(config.world_to_uv(-50.0, 50.0), (0.0, 1.0));
    }

    #[test]
    fn test_uniform_size() {
        assert_eq!(std::mem::size_of::<DomainUniform>(), 48);
    }
}
