//! Particle seeding, the per-step update rule and instance placement.
//!
//! These are the CPU reference forms of the kernel's seeding, simulation and
//! presentation shaders. The host checks GPU readbacks against them.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::height::HeightField;
use crate::layout::{index_to_grid, ParticleLayout};

/// Initial lattice placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedParams {
    /// Added to every lattice X before centring
    pub x_shift: f32,
    /// Vertical extent of the lattice
    pub height_scale: f32,
    /// Vertical offset of the lowest layer
    pub height_bias: f32,
}

impl Default for SeedParams {
    fn default() -> Self {
        Self {
            x_shift: 10.0,
            height_scale: 2.0,
            height_bias: 2.5,
        }
    }
}

/// What a step does with a particle relative to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SurfacePolicy {
    /// Always place the particle on the surface and drift.
    #[default]
    Snap,
    /// Pop particles found below the surface to `surface + lift`; drift the rest.
    Lift {
        /// Clearance above the surface
        lift: f32,
    },
    /// Move particles found below the surface to a fixed height; drift the rest.
    Teleport {
        /// Absolute height to move to
        height: f32,
    },
}

impl SurfacePolicy {
    /// Shader mode id and its parameter.
    #[must_use]
    pub const fn gpu_mode(&self) -> (u32, f32) {
        match *self {
            Self::Snap => (0, 0.0),
            Self::Lift { lift } => (1, lift),
            Self::Teleport { height } => (2, height),
        }
    }
}

/// Per-step simulation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Leftward X movement per step
    pub drift_step: f32,
    /// Surface interaction
    pub policy: SurfacePolicy,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            drift_step: 0.01,
            policy: SurfacePolicy::Snap,
        }
    }
}

impl SimulationParams {
    /// Rejects non-finite parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.drift_step.is_finite() {
            return Err(ConfigError::InvalidDriftStep(self.drift_step));
        }
        let (_, value) = self.policy.gpu_mode();
        if !value.is_finite() {
            return Err(ConfigError::NonFinite("policy"));
        }
        Ok(())
    }
}

/// Seeded position of particle `i`, lattice centred on the origin.
#[must_use]
pub fn seed_position(i: u32, grid: u32, seed: &SeedParams) -> Vec3 {
    let cell = index_to_grid(i, grid).as_vec3();
    let half = (grid - 1) as f32 * 0.5;
    let y_norm = cell.y / (grid - 1) as f32;
    Vec3::new(
        cell.x + seed.x_shift,
        y_norm * seed.height_scale + seed.height_bias,
        cell.z,
    ) - Vec3::splat(half)
}

/// Applies one step of the update rule to a single position.
#[must_use]
pub fn step_position(position: Vec3, height: &HeightField, params: &SimulationParams) -> Vec3 {
    let surface = height.sample_world(position.x, position.z).height;
    let mut next = position;
    match params.policy {
        SurfacePolicy::Snap => {
            next.x -= params.drift_step;
            next.y = surface;
        },
        SurfacePolicy::Lift { lift } => {
            if position.y < surface {
                next.y = surface + lift;
            } else {
                next.x -= params.drift_step;
            }
        },
        SurfacePolicy::Teleport { height } => {
            if position.y < surface {
                next.y = height;
            } else {
                next.x -= params.drift_step;
            }
        },
    }
    next
}

/// CPU copy of one particle state texture.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSnapshot {
    layout: ParticleLayout,
    texels: Vec<[f32; 4]>,
}

impl ParticleSnapshot {
    /// Texels for the seeded lattice; padding texels are zero.
    #[must_use]
    pub fn seeded(layout: ParticleLayout, seed: &SeedParams) -> Self {
        let texels = (0..layout.capacity())
            .map(|i| {
                let i = i as u32;
                if layout.is_live(i) {
                    seed_position(i, layout.grid(), seed).extend(1.0).to_array()
                } else {
                    [0.0; 4]
                }
            })
            .collect();
        Self { layout, texels }
    }

    /// Wraps texels read back from the GPU.
    ///
    /// # Panics
    /// Panics if the texel count does not match the layout.
    #[must_use]
    pub fn from_texels(layout: ParticleLayout, texels: Vec<[f32; 4]>) -> Self {
        assert_eq!(
            texels.len() as u64,
            layout.capacity(),
            "Particle texel count mismatch"
        );
        Self { layout, texels }
    }

    /// Produces the next state. Does not modify `self`.
    #[must_use]
    pub fn advance(&self, height: &HeightField, params: &SimulationParams) -> Self {
        let texels = self
            .texels
            .iter()
            .enumerate()
            .map(|(i, texel)| {
                if self.layout.is_live(i as u32) {
                    let position = Vec3::from_slice(&texel[..3]);
                    step_position(position, height, params).extend(1.0).to_array()
                } else {
                    [0.0; 4]
                }
            })
            .collect();
        Self {
            layout: self.layout,
            texels,
        }
    }

    /// Position of particle `i`, read through the index-to-texel mapping.
    ///
    /// # Panics
    /// Panics if `i` is not a live particle; padding texels are never presented.
    #[must_use]
    pub fn instance_position(&self, i: u32) -> Vec3 {
        assert!(
            self.layout.is_live(i),
            "particle index {i} out of range (count {})",
            self.layout.count()
        );
        let texel = self.layout.texel(i);
        let offset = (texel.y * self.layout.texture_size() + texel.x) as usize;
        Vec3::from_slice(&self.texels[offset][..3])
    }

    /// Positions of all live particles in index order.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        (0..self.layout.count()).map(|i| self.instance_position(i))
    }

    /// Layout of the texture.
    #[must_use]
    pub const fn layout(&self) -> &ParticleLayout {
        &self.layout
    }

    /// Raw texels, row-major.
    #[must_use]
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }
}
