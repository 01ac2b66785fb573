//! GPU validation harness.
//!
//! This module provides validation infrastructure for the texture pipeline:
//! - wgpu validation layer integration (debug builds or on request)
//! - Error callback handling and logging
//! - Texel-by-texel comparison of GPU readbacks against the CPU reference

use tracing::{error, info, warn};

/// Returns wgpu instance flags with validation enabled when requested.
///
/// `VALIDATION | DEBUG` when `enabled`, empty otherwise.
#[must_use]
pub fn gpu_instance_flags(enabled: bool) -> wgpu::InstanceFlags {
    if enabled {
        info!("GPU validation layer enabled");
        wgpu::InstanceFlags::VALIDATION | wgpu::InstanceFlags::DEBUG
    } else {
        info!("GPU validation layer disabled");
        wgpu::InstanceFlags::empty()
    }
}

/// Creates a wgpu instance with the given validation setting.
#[must_use]
pub fn create_validated_instance(validation: bool) -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: gpu_instance_flags(validation),
        ..Default::default()
    })
}

/// Handles wgpu device errors by logging them.
///
/// Use this with `device.on_uncaptured_error()`.
pub fn handle_device_error(error: &wgpu::Error) {
    error!("GPU device error: {error}");
}

/// Outcome of comparing two texel arrays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TexelComparison {
    /// Texels compared
    pub compared: usize,
    /// Texels with any channel off by more than the tolerance
    pub mismatches: usize,
    /// Largest absolute channel difference seen
    pub max_abs_error: f32,
    /// First mismatching texel index
    pub first_mismatch: Option<usize>,
}

impl TexelComparison {
    /// Whether every texel matched.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compares the first `limit` texels of two arrays channel by channel.
///
/// Only the `xyz` channels are compared; `w` is a liveness flag in particle
/// textures and a constant in the height texture. Texels beyond `limit`
/// (padding) are ignored; texels below `limit` present in only one array
/// count as mismatches.
#[must_use]
pub fn compare_texels(
    expected: &[[f32; 4]],
    actual: &[[f32; 4]],
    tolerance: f32,
    limit: usize,
) -> TexelComparison {
    let mut result = TexelComparison::default();
    for (index, (e, a)) in expected.iter().zip(actual).take(limit).enumerate() {
        result.compared += 1;
        // f32::max drops NaN, so propagate it by hand
        let error = (0..3)
            .map(|c| (e[c] - a[c]).abs())
            .fold(0.0f32, |acc, d| {
                if acc.is_nan() || d.is_nan() {
                    f32::NAN
                } else {
                    acc.max(d)
                }
            });
        if error > tolerance || error.is_nan() {
            result.mismatches += 1;
            result.first_mismatch.get_or_insert(index);
        }
        if error.is_nan() {
            result.max_abs_error = f32::NAN;
        } else if !result.max_abs_error.is_nan() {
            result.max_abs_error = result.max_abs_error.max(error);
        }
    }

    let expected_len = expected.len().min(limit);
    let actual_len = actual.len().min(limit);
    let missing = expected_len.abs_diff(actual_len);
    if missing > 0 {
        result.compared += missing;
        result.mismatches += missing;
        result.first_mismatch.get_or_insert(expected_len.min(actual_len));
    }
    result
}

/// GPU validation result.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether validation passed
    pub passed: bool,
    /// Validation messages
    pub messages: Vec<String>,
    /// Frame number when validated
    pub frame: u64,
}

impl ValidationResult {
    /// Creates a passing result.
    #[must_use]
    pub fn pass(frame: u64) -> Self {
        Self {
            passed: true,
            messages: vec![],
            frame,
        }
    }

    /// Creates a failing result.
    #[must_use]
    pub fn fail(frame: u64, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            messages: vec![message.into()],
            frame,
        }
    }
}

/// Records pass/fail of GPU-vs-reference checks per frame.
pub struct ValidationHarness {
    /// Whether validation is enabled
    enabled: bool,
    /// Collected validation results
    results: Vec<ValidationResult>,
    /// Current frame counter
    frame: u64,
}

impl Default for ValidationHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationHarness {
    /// Creates a new validation harness.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            results: Vec::new(),
            frame: 0,
        }
    }

    /// Enables or disables validation.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if enabled {
            info!("GPU validation enabled");
        } else {
            warn!("GPU validation disabled");
        }
    }

    /// Sets the frame that subsequent results are recorded against.
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Validates a condition, recording the result.
    pub fn validate(&mut self, condition: bool, message: &str) -> bool {
        if !self.enabled {
            return condition;
        }

        if condition {
            self.results.push(ValidationResult::pass(self.frame));
        } else {
            error!("GPU validation failed at frame {}: {message}", self.frame);
            self.results
                .push(ValidationResult::fail(self.frame, message));
        }

        condition
    }

    /// Records a texel comparison.
    pub fn validate_texels(&mut self, what: &str, comparison: &TexelComparison) -> bool {
        let message = format!(
            "{what}: {} of {} texels differ (max error {:.3e}, first at {:?})",
            comparison.mismatches,
            comparison.compared,
            comparison.max_abs_error,
            comparison.first_mismatch
        );
        self.validate(comparison.passed(), &message)
    }

    /// Returns all validation results.
    #[must_use]
    pub fn results(&self) -> &[ValidationResult] {
        &self.results
    }

    /// Returns the number of failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_pass() {
        let mut harness = ValidationHarness::new();
        harness.set_enabled(true);
        harness.set_frame(1);

        assert!(harness.validate(true, "should pass"));
        assert_eq!(harness.failure_count(), 0);
    }

    #[test]
    fn test_validation_fail() {
        let mut harness = ValidationHarness::new();
        harness.set_enabled(true);
        harness.set_frame(7);

        assert!(!harness.validate(false, "should fail"));
        assert_eq!(harness.failure_count(), 1);
        assert_eq!(harness.results()[0].frame, 7);
    }

    #[test]
    fn test_disabled_harness_records_nothing() {
        let mut harness = ValidationHarness::new();
        harness.set_enabled(false);
        assert!(!harness.validate(false, "ignored"));
        assert!(harness.results().is_empty());
    }

    #[test]
    fn test_compare_texels() {
        let expected = [[1.0, 2.0, 3.0, 1.0], [0.0, 0.0, 0.0, 1.0], [5.0; 4]];
        let actual = [[1.0, 2.0, 3.00001, 0.0], [0.0, 0.5, 0.0, 1.0], [9.0; 4]];

        let cmp = compare_texels(&expected, &actual, 1e-4, 2);
        assert_eq!(cmp.compared, 2);
        assert_eq!(cmp.mismatches, 1);
        assert_eq!(cmp.first_mismatch, Some(1));
        assert!((cmp.max_abs_error - 0.5).abs() < 1e-6);
        assert!(!cmp.passed());

        let cmp = compare_texels(&expected, &actual, 1e-4, 1);
        assert!(cmp.passed());
    }

    #[test]
    fn test_compare_texels_flags_length_mismatch() {
        let expected = vec![[1.0, 2.0, 3.0, 1.0]; 4];
        let truncated = &expected[..2];

        let comparison = compare_texels(&expected, truncated, 1e-6, usize::MAX);
        assert!(!comparison.passed());
        assert_eq!(comparison.compared, 4);
        assert_eq!(comparison.mismatches, 2);
        assert_eq!(comparison.first_mismatch, Some(2));

        let comparison = compare_texels(truncated, &expected, 1e-6, usize::MAX);
        assert_eq!(comparison.mismatches, 2);

        // Texels past the limit are padding either way
        assert!(compare_texels(&expected, truncated, 1e-6, 2).passed());
    }

    #[test]
    fn test_compare_texels_flags_nan() {
        let cmp = compare_texels(&[[0.0; 4]], &[[f32::NAN, 0.0, 0.0, 0.0]], 1.0, 1);
        assert_eq!(cmp.mismatches, 1);
        assert!(cmp.max_abs_error.is_nan());
    }

    #[test]
    fn test_validate_texels_message() {
        let mut harness = ValidationHarness::new();
        harness.set_enabled(true);
        let cmp = TexelComparison {
            compared: 4,
            mismatches: 2,
            max_abs_error: 0.5,
            first_mismatch: Some(1),
        };
        assert!(!harness.validate_texels("height", &cmp));
        assert!(harness.results()[0].messages[0].starts_with("height: 2 of 4"));
    }
}
