//! Particle index layout: lattice ↔ index ↔ texel.
//!
//! Particles are stored one per texel in a square float texture. The mapping
//! from a particle index to its texel is row-major. CPU code goes through
//! these functions; the kernel's shaders share a single WGSL copy of the
//! mapping that every writer (seeding, simulation) and reader (presentation)
//! calls.

use glam::{UVec2, UVec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lattice coordinate for particle index `i` in a `grid³` cube.
#[must_use]
pub const fn index_to_grid(i: u32, grid: u32) -> UVec3 {
    let plane = grid * grid;
    let z = i / plane;
    let rem = i % plane;
    UVec3::new(rem % grid, rem / grid, z)
}

/// Inverse of [`index_to_grid`].
#[must_use]
pub const fn grid_to_index(coord: UVec3, grid: u32) -> u32 {
    coord.z * grid * grid + coord.y * grid + coord.x
}

/// Texel holding particle `i` in a `size`×`size` texture.
#[must_use]
pub const fn index_to_texel(i: u32, size: u32) -> UVec2 {
    UVec2::new(i % size, i / size)
}

/// Linear index of a texel.
#[must_use]
pub const fn texel_to_index(texel: UVec2, size: u32) -> u32 {
    texel.y * size + texel.x
}

/// Normalized coordinate of a texel's centre.
#[must_use]
pub fn texel_center_uv(texel: UVec2, size: u32) -> (f32, f32) {
    let size = size as f32;
    ((texel.x as f32 + 0.5) / size, (texel.y as f32 + 0.5) / size)
}

/// Nearest texel for a normalized coordinate, clamp-to-edge.
#[must_use]
pub fn uv_to_texel(u: f32, v: f32, size: u32) -> UVec2 {
    let max = (size - 1) as f32;
    let x = (u * size as f32).floor().clamp(0.0, max);
    let y = (v * size as f32).floor().clamp(0.0, max);
    UVec2::new(x as u32, y as u32)
}

/// Shape of the particle state textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleLayout {
    /// Lattice edge length G
    grid: u32,
    /// Texture edge length T
    texture_size: u32,
}

impl ParticleLayout {
    /// Creates a layout for a `grid³` lattice with the smallest square texture.
    pub fn new(grid: u32) -> Result<Self, ConfigError> {
        let count = Self::checked_count(grid)?;
        let mut texture_size = f64::from(count).sqrt().ceil() as u32;
        while u64::from(texture_size) * u64::from(texture_size) < u64::from(count) {
            texture_size += 1;
        }
        Self::with_texture_size(grid, texture_size)
    }

    /// Creates a layout with an explicit texture size.
    pub fn with_texture_size(grid: u32, texture_size: u32) -> Result<Self, ConfigError> {
        let count = Self::checked_count(grid)?;
        let capacity = u64::from(texture_size) * u64::from(texture_size);
        if capacity < u64::from(count) {
            return Err(ConfigError::TextureTooSmall {
                size: texture_size,
                count,
            });
        }
        Ok(Self { grid, texture_size })
    }

    fn checked_count(grid: u32) -> Result<u32, ConfigError> {
        if grid < 2 {
            return Err(ConfigError::GridTooSmall(grid));
        }
        grid.checked_mul(grid)
            .and_then(|plane| plane.checked_mul(grid))
            .ok_or(ConfigError::ParticleCountOverflow(grid))
    }

    /// Lattice edge length G.
    #[must_use]
    pub const fn grid(&self) -> u32 {
        self.grid
    }

    /// Texture edge length T.
    #[must_use]
    pub const fn texture_size(&self) -> u32 {
        self.texture_size
    }

    /// Particle count N = G³.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.grid * self.grid * self.grid
    }

    /// Texel count T².
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.texture_size as u64 * self.texture_size as u64
    }

    /// Texel holding particle `i`.
    #[must_use]
    pub const fn texel(&self, i: u32) -> UVec2 {
        index_to_texel(i, self.texture_size)
    }

    /// Whether linear texel index `i` holds a particle.
    #[must_use]
    pub const fn is_live(&self, i: u32) -> bool {
        i < self.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_grid_corners() {
        assert_eq!(index_to_grid(0, 10), UVec3::ZERO);
        assert_eq!(index_to_grid(999, 10), UVec3::new(9, 9, 9));
        assert_eq!(index_to_grid(10, 10), UVec3::new(0, 1, 0));
        assert_eq!(index_to_grid(100, 10), UVec3::new(0, 0, 1));
    }

    #[test]
    fn test_texel_mapping() {
        assert_eq!(index_to_texel(0, 32), UVec2::ZERO);
        assert_eq!(index_to_texel(33, 32), UVec2::new(1, 1));
        assert_eq!(index_to_texel(999, 32), UVec2::new(7, 31));
        assert_eq!(texel_center_uv(UVec2::ZERO, 32), (0.5 / 32.0, 0.5 / 32.0));
    }

    #[test]
    fn test_uv_to_texel_clamps() {
        assert_eq!(uv_to_texel(0.0, 0.0, 512), UVec2::ZERO);
        assert_eq!(uv_to_texel(1.0, 1.0, 512), UVec2::new(511, 511));
        assert_eq!(uv_to_texel(-0.5, 2.0, 512), UVec2::new(0, 511));
    }

    #[test]
    fn test_layout_default_texture_size() {
        let layout = ParticleLayout::new(10).expect("valid grid");
        assert_eq!(layout.count(), 1000);
        assert_eq!(layout.texture_size(), 32);
        assert!(layout.is_live(999));
        assert!(!layout.is_live(1000));

        // 4³ = 64 fits exactly in 8×8
        let layout = ParticleLayout::new(4).expect("valid grid");
        assert_eq!(layout.texture_size(), 8);
    }

    #[test]
    fn test_layout_rejects_bad_sizes() {
        assert_eq!(ParticleLayout::new(1), Err(ConfigError::GridTooSmall(1)));
        assert_eq!(
            ParticleLayout::with_texture_size(10, 31),
            Err(ConfigError::TextureTooSmall {
                size: 31,
                count: 1000
            })
        );
        assert_eq!(
            ParticleLayout::new(5000),
            Err(ConfigError::ParticleCountOverflow(5000))
        );
    }

    proptest! {
        #[test]
        fn prop_grid_round_trip(grid in 2u32..40, seed in any::<u32>()) {
            let i = seed % (grid * grid * grid);
            let coord = index_to_grid(i, grid);
            prop_assert!(coord.x < grid && coord.y < grid && coord.z < grid);
            prop_assert_eq!(grid_to_index(coord, grid), i);
        }

        #[test]
        fn prop_texel_round_trip(size in 1u32..2048, seed in any::<u32>()) {
            let i = seed % (size * size);
            let texel = index_to_texel(i, size);
            prop_assert_eq!(texel_to_index(texel, size), i);
            let (u, v) = texel_center_uv(texel, size);
            prop_assert_eq!(uv_to_texel(u, v, size), texel);
        }
    }
}
