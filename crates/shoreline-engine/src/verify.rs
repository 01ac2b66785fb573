//! GPU-vs-reference checks for the headless run.
//!
//! The verifier keeps a CPU copy of the pipeline and advances it lazily, only
//! when a check is due, to the number of steps the GPU has taken.

use shoreline_common::{
    GpuError, HeightField, ParticleSnapshot, ShorelineError, ShorelineResult, SimulationParams,
};
use shoreline_kernel::{compare_texels, FramePipeline, GpuContext, ValidationHarness};
use tracing::{debug, warn};

use crate::config::EngineConfig;

/// CPU copy of the pipeline state.
struct Reference {
    height: HeightField,
    particles: ParticleSnapshot,
    /// Steps applied to `particles`
    steps: u64,
}

/// Compares GPU readbacks against the CPU reference.
pub struct Verifier {
    harness: ValidationHarness,
    /// Dropped when verification is off or the targets cannot be read back
    reference: Option<Reference>,
    every: u64,
    tolerance: f32,
}

impl Verifier {
    /// Builds the CPU reference for a configuration.
    ///
    /// Nothing is baked when `verify_every` is zero.
    pub fn new(config: &EngineConfig) -> ShorelineResult<Self> {
        let enabled = config.verify_every > 0;
        let mut harness = ValidationHarness::new();
        harness.set_enabled(enabled);

        let reference = if enabled {
            let settings = config.pipeline_settings();
            let layout = settings.layout()?;
            Some(Reference {
                height: HeightField::bake_reference(&settings.domain, settings.height_resolution)?,
                particles: ParticleSnapshot::seeded(layout, &settings.seed),
                steps: 0,
            })
        } else {
            None
        };

        Ok(Self {
            harness,
            reference,
            every: config.verify_every,
            tolerance: config.verify_tolerance,
        })
    }

    /// Whether particles should be checked after `frame`.
    #[must_use]
    pub fn is_due(&self, frame: u64) -> bool {
        self.reference.is_some() && frame % self.every.max(1) == 0
    }

    /// Checks the baked height field.
    pub fn check_height(&mut self, ctx: &GpuContext, pipeline: &FramePipeline, frame: u64) {
        if self.reference.is_none() {
            return;
        }
        let Some(baked) = self.readback(pipeline.read_height_field(&ctx.device, &ctx.queue)) else {
            return;
        };
        let Some(reference) = &self.reference else {
            return;
        };

        let comparison = compare_texels(
            &reference.height.to_texels(),
            &baked.to_texels(),
            self.tolerance,
            usize::MAX,
        );
        self.harness.set_frame(frame);
        self.harness.validate_texels("height field", &comparison);
    }

    /// Checks the current particle buffer against the reference at the same step.
    pub fn check_particles(&mut self, ctx: &GpuContext, pipeline: &FramePipeline, frame: u64) {
        if self.reference.is_none() {
            return;
        }
        let Some(actual) = self.readback(pipeline.read_particles(&ctx.device, &ctx.queue)) else {
            return;
        };
        let Some(reference) = &mut self.reference else {
            return;
        };
        reference.catch_up(pipeline.phase().steps(), &pipeline.settings().simulation);

        let comparison = compare_texels(
            reference.particles.texels(),
            actual.texels(),
            self.tolerance,
            actual.layout().count() as usize,
        );
        self.harness.set_frame(frame);
        if self.harness.validate_texels("particles", &comparison) {
            debug!(
                "Frame {frame}: particles match reference (max error {:.3e})",
                comparison.max_abs_error
            );
        }
    }

    /// Failed checks so far.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.harness.failure_count()
    }

    /// Checks performed so far.
    #[must_use]
    pub fn check_count(&self) -> usize {
        self.harness.results().len()
    }

    /// Unwraps a readback, turning verification off when the format cannot be read.
    fn readback<T>(&mut self, result: ShorelineResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(ShorelineError::Gpu(GpuError::Readback(reason))) => {
                warn!("Verification disabled, targets cannot be read back: {reason}");
                self.reference = None;
                None
            },
            Err(e) => {
                self.harness.validate(false, &e.to_string());
                None
            },
        }
    }
}

impl Reference {
    fn catch_up(&mut self, steps: u64, params: &SimulationParams) {
        while self.steps < steps {
            self.particles = self.particles.advance(&self.height, params);
            self.steps += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule() {
        let config = EngineConfig {
            verify_every: 30,
            ..EngineConfig::default()
        };
        let verifier = Verifier::new(&config).expect("verifier");
        assert!(verifier.is_due(0));
        assert!(!verifier.is_due(29));
        assert!(verifier.is_due(60));
    }

    #[test]
    fn test_disabled_never_due() {
        let config = EngineConfig {
            verify_every: 0,
            ..EngineConfig::default()
        };
        let verifier = Verifier::new(&config).expect("verifier");
        assert!(verifier.reference.is_none());
        assert!(!verifier.is_due(0));
        assert_eq!(verifier.check_count(), 0);
    }

    #[test]
    fn test_reference_catches_up() {
        let verifier = Verifier::new(&EngineConfig::default()).expect("verifier");
        let mut reference = verifier.reference.expect("reference");
        let params = SimulationParams::default();
        let seeded = reference.particles.clone();

        reference.catch_up(3, &params);
        assert_eq!(reference.steps, 3);
        let expected = (0..3).fold(seeded, |p, _| p.advance(&reference.height, &params));
        assert_eq!(reference.particles, expected);

        // Already at or past the target
        reference.catch_up(2, &params);
        assert_eq!(reference.steps, 3);
    }

    #[test]
    fn test_readback_error_disables() {
        let mut verifier = Verifier::new(&EngineConfig::default()).expect("verifier");
        let result: ShorelineResult<()> =
            Err(GpuError::Readback("Rgba16Float".to_string()).into());
        assert!(verifier.readback(result).is_none());
        assert!(verifier.reference.is_none());
        assert!(!verifier.is_due(0));
        assert_eq!(verifier.failure_count(), 0);
    }
}
