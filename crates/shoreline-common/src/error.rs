//! Error types for Shoreline.

use thiserror::Error;

/// Top-level error type for Shoreline operations.
#[derive(Debug, Error)]
pub enum ShorelineError {
    /// Configuration errors (fatal at setup)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// GPU-related errors
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
///
/// Any of these prevents the pipeline from starting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Domain rectangle has zero or negative extent on an axis
    #[error("Degenerate domain on {axis} axis: min {min} must be less than max {max}")]
    DegenerateDomain {
        /// Axis name ("x" or "z")
        axis: &'static str,
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },

    /// A parameter is NaN or infinite
    #[error("Parameter `{0}` must be finite")]
    NonFinite(&'static str),

    /// Feature region bounds are inverted
    #[error("Feature region is inverted: x min {min} is greater than x max {max}")]
    InvertedFeatureRegion {
        /// Lower bound
        min: f32,
        /// Upper bound
        max: f32,
    },

    /// Height-field resolution must be positive
    #[error("Invalid height-field resolution: {0}")]
    InvalidResolution(u32),

    /// Particle lattice must be at least 2 wide
    #[error("Particle grid size {0} is too small (minimum 2)")]
    GridTooSmall(u32),

    /// Particle texture cannot hold every particle
    #[error("Particle texture {size}x{size} cannot hold {count} particles")]
    TextureTooSmall {
        /// Texture edge length
        size: u32,
        /// Particle count
        count: u32,
    },

    /// G^3 does not fit the index type
    #[error("Particle grid size {0} overflows the particle index range")]
    ParticleCountOverflow(u32),

    /// Drift step is not a finite number
    #[error("Invalid drift step: {0}")]
    InvalidDriftStep(f32),
}

/// GPU-specific errors.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to initialize GPU
    #[error("GPU initialization failed: {0}")]
    InitFailed(String),

    /// The adapter cannot render to or sample the requested float format
    #[error("Texture format {format} is not usable as a render target{}", fallback_hint(.fallback))]
    FormatUnsupported {
        /// Requested format
        format: &'static str,
        /// Fallback that was also tried, if one was configured
        fallback: Option<&'static str>,
    },

    /// Requested texture exceeds the device's 2D texture limit
    #[error("Texture size {size} exceeds device limit {max}")]
    TextureTooLarge {
        /// Requested edge length
        size: u32,
        /// Device limit
        max: u32,
    },

    /// Texture readback failed
    #[error("Readback failed: {0}")]
    Readback(String),
}

fn fallback_hint(fallback: &Option<&'static str>) -> String {
    match fallback {
        Some(format) => format!(" (fallback {format} is unsupported too)"),
        None => " and no fallback precision is configured".to_string(),
    }
}

/// Result type alias for Shoreline operations.
pub type ShorelineResult<T> = Result<T, ShorelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unsupported_message() {
        let err = GpuError::FormatUnsupported {
            format: "Rgba32Float",
            fallback: None,
        };
        assert!(err.to_string().contains("no fallback precision"));

        let err = GpuError::FormatUnsupported {
            format: "Rgba32Float",
            fallback: Some("Rgba16Float"),
        };
        assert!(err.to_string().contains("Rgba16Float is unsupported too"));
    }

    #[test]
    fn test_config_error_converts() {
        let err: ShorelineError = ConfigError::GridTooSmall(1).into();
        assert!(matches!(err, ShorelineError::Config(ConfigError::GridTooSmall(1))));
    }
}
