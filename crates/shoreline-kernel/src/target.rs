//! Offscreen float render targets used as general-purpose data buffers.
//!
//! Every buffer in the pipeline (the height field and both particle state
//! textures) is a square RGBA float texture that one full-screen pass renders
//! into and later passes read with `textureLoad`.

use shoreline_common::{GpuError, TexelPrecision};
use tracing::{info, warn};
use wgpu::{Adapter, Device, TextureFormat, TextureUsages};

/// Usages every float target needs.
pub const FLOAT_TARGET_USAGES: TextureUsages = TextureUsages::RENDER_ATTACHMENT
    .union(TextureUsages::TEXTURE_BINDING)
    .union(TextureUsages::COPY_SRC);

/// Texture format for a precision.
#[must_use]
pub const fn precision_format(precision: TexelPrecision) -> TextureFormat {
    match precision {
        TexelPrecision::Full => TextureFormat::Rgba32Float,
        TexelPrecision::Half => TextureFormat::Rgba16Float,
    }
}

fn format_name(format: TextureFormat) -> &'static str {
    match format {
        TextureFormat::Rgba32Float => "Rgba32Float",
        TextureFormat::Rgba16Float => "Rgba16Float",
        _ => "unknown",
    }
}

/// Whether the adapter can render into, sample and copy from `format`.
#[must_use]
pub fn supports_float_target(adapter: &Adapter, format: TextureFormat) -> bool {
    adapter
        .get_texture_format_features(format)
        .allowed_usages
        .contains(FLOAT_TARGET_USAGES)
}

/// Picks the float format for the pipeline's targets.
///
/// Uses `requested` when supported, otherwise the explicitly configured
/// `fallback`. With no usable format this is a fatal allocation error.
pub fn select_float_format(
    adapter: &Adapter,
    requested: TexelPrecision,
    fallback: Option<TexelPrecision>,
) -> Result<TextureFormat, GpuError> {
    let format = precision_format(requested);
    if supports_float_target(adapter, format) {
        info!("Using {} float targets", format_name(format));
        return Ok(format);
    }

    match fallback {
        Some(precision) if precision != requested => {
            let fallback_format = precision_format(precision);
            if supports_float_target(adapter, fallback_format) {
                warn!(
                    "{} float targets unsupported, using configured fallback {}",
                    format_name(format),
                    format_name(fallback_format)
                );
                Ok(fallback_format)
            } else {
                Err(GpuError::FormatUnsupported {
                    format: format_name(format),
                    fallback: Some(format_name(fallback_format)),
                })
            }
        },
        _ => Err(GpuError::FormatUnsupported {
            format: format_name(format),
            fallback: None,
        }),
    }
}

/// Rejects texture sizes beyond the device limit.
pub fn check_texture_size(device: &Device, size: u32) -> Result<(), GpuError> {
    let max = device.limits().max_texture_dimension_2d;
    if size > max {
        return Err(GpuError::TextureTooLarge { size, max });
    }
    Ok(())
}

/// A square float texture with its default view.
pub struct FloatTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: u32,
}

impl FloatTarget {
    /// Allocates a `size`×`size` target.
    pub fn new(
        device: &Device,
        label: &str,
        size: u32,
        format: TextureFormat,
    ) -> Result<Self, GpuError> {
        check_texture_size(device, size)?;

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: FLOAT_TARGET_USAGES,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            size,
        })
    }

    /// The texture.
    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Default view of the texture.
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Edge length in texels.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Texture format.
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.texture.format()
    }
}

/// Layout entry for reading a float target with `textureLoad`.
#[must_use]
pub const fn float_texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Layout entry for a uniform buffer.
#[must_use]
pub const fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
