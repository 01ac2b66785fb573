//! GPU→CPU readback of float targets.
//!
//! Used by verification and tooling only; the frame loop itself never waits
//! on the GPU. Each call blocks until the copy is mapped.

use shoreline_common::GpuError;
use tracing::debug;
use wgpu::{BufferUsages, Device, MapMode, Queue};

/// Bytes per `Rgba32Float` texel.
const TEXEL_BYTES: u32 = 16;

/// Row pitch of a `width`-texel row, padded to the copy alignment.
#[must_use]
pub const fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Strips row padding from a mapped copy.
fn unpack_rows(size: u32, padded_bpr: u32, bytes: &[u8]) -> Vec<[f32; 4]> {
    let row_bytes = (size * TEXEL_BYTES) as usize;
    let mut out = Vec::with_capacity((size as usize).pow(2));
    for row in bytes.chunks_exact(padded_bpr as usize).take(size as usize) {
        out.extend_from_slice(bytemuck::cast_slice::<u8, [f32; 4]>(&row[..row_bytes]));
    }
    out
}

/// Reads a square `Rgba32Float` texture into row-major texels.
///
/// # Arguments
/// * `device` - The wgpu device
/// * `queue` - The queue the texture was written on
/// * `texture` - Texture to read; must have `COPY_SRC`
/// * `size` - Edge length in texels
pub fn read_rgba32f(
    device: &Device,
    queue: &Queue,
    texture: &wgpu::Texture,
    size: u32,
) -> Result<Vec<[f32; 4]>, GpuError> {
    if texture.format() != wgpu::TextureFormat::Rgba32Float {
        return Err(GpuError::Readback(format!(
            "only Rgba32Float targets can be read back, got {:?}",
            texture.format()
        )));
    }

    let padded_bpr = padded_bytes_per_row(size);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Texture Readback Buffer"),
        size: u64::from(padded_bpr) * u64::from(size),
        usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Texture Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded_bpr),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    rx.recv()
        .map_err(|e| GpuError::Readback(e.to_string()))?
        .map_err(|e| GpuError::Readback(e.to_string()))?;

    let data = slice.get_mapped_range();
    let texels = unpack_rows(size, padded_bpr, &data);
    drop(data);
    staging.unmap();

    debug!("Read back {size}x{size} texels");
    Ok(texels)
}
