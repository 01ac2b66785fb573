//! # Shoreline Common
//!
//! GPU-free types and reference math for Shoreline.
//!
//! This crate provides the data model shared by the kernel and the host:
//! - Domain rectangle and analytic terrain parameters
//! - Particle index layout (lattice, linear index, texel)
//! - CPU reference height field, seeding and update rule
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod domain;
pub mod error;
pub mod height;
pub mod layout;
pub mod particles;
pub mod precision;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::domain::*;
    pub use crate::error::*;
    pub use crate::height::*;
    pub use crate::layout::*;
    pub use crate::particles::*;
    pub use crate::precision::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pipeline_end_to_end() {
        let config = DomainConfig::default();
        let height = HeightField::bake_reference(&config, 512).expect("bake");
        let layout = ParticleLayout::new(10).expect("layout");
        let params = SimulationParams::default();

        let mut state = ParticleSnapshot::seeded(layout, &SeedParams::default());
        for _ in 0..3 {
            state = state.advance(&height, &params);
        }

        let first = state.instance_position(0);
        assert!((first.x - (5.5 - 3.0 * params.drift_step)).abs() < 1e-5);
        assert_eq!(first.y, height.sample_world(first.x + params.drift_step, first.z).height);
    }
}
