//! Height-field PNG snapshots.

use anyhow::{Context, Result};
use image::{ImageBuffer, Luma};
use shoreline_common::HeightField;
use std::path::Path;
use tracing::info;

/// Height samples mapped to 16-bit gray, normalized over the field's range.
///
/// A flat field maps to zero everywhere.
#[must_use]
pub fn height_to_luma16(field: &HeightField) -> Vec<u16> {
    let (min, max) = field.height_range();
    let span = max - min;
    field
        .samples()
        .iter()
        .map(|s| {
            if span > 0.0 {
                (((s.height - min) / span) * f32::from(u16::MAX)).round() as u16
            } else {
                0
            }
        })
        .collect()
}

/// Writes the field as a 16-bit grayscale PNG.
pub fn write_height_png(field: &HeightField, path: &Path) -> Result<()> {
    let resolution = field.resolution();
    let image: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(resolution, resolution, height_to_luma16(field))
            .context("height buffer does not match resolution")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("writing height snapshot {}", path.display()))?;

    let (min, max) = field.height_range();
    info!(
        "Wrote height snapshot {} ({resolution}x{resolution}, range {min:.3}..{max:.3})",
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoreline_common::DomainConfig;

    #[test]
    fn test_luma_spans_full_range() {
        let field = HeightField::bake_reference(&DomainConfig::default(), 32).expect("bake");
        let luma = height_to_luma16(&field);
        assert_eq!(luma.len(), 32 * 32);
        assert_eq!(luma.iter().copied().min(), Some(0));
        assert_eq!(luma.iter().copied().max(), Some(u16::MAX));
    }

    #[test]
    fn test_write_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("snapshots").join("height.png");
        let field = HeightField::bake_reference(&DomainConfig::default(), 16).expect("bake");

        write_height_png(&field, &path).expect("write");

        let decoded = image::open(&path).expect("open").into_luma16();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded.into_raw(), height_to_luma16(&field));
    }
}
