//! Headless host: drives the frame pipeline into an offscreen target.

use anyhow::{bail, Context, Result};
use glam::{Mat4, Vec3};
use shoreline_common::GpuError;
use shoreline_kernel::{check_texture_size, FramePipeline, GpuContext, DEPTH_FORMAT};
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::snapshot::write_height_png;
use crate::timing::FrameStats;
use crate::verify::Verifier;

/// Color format of the offscreen presentation target.
const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Frames between progress log lines.
const PROGRESS_INTERVAL: u64 = 120;

/// Camera matrix for the configured eye and target.
#[must_use]
pub fn camera_view_proj(config: &EngineConfig) -> Mat4 {
    let view = Mat4::look_at_rh(
        Vec3::from_array(config.camera_eye),
        Vec3::from_array(config.camera_target),
        Vec3::Y,
    );
    let proj = Mat4::perspective_rh(45f32.to_radians(), config.aspect_ratio(), 0.1, 100.0);
    proj * view
}

/// Offscreen color and depth targets for presentation.
struct OffscreenTargets {
    color: wgpu::TextureView,
    depth: wgpu::TextureView,
}

impl OffscreenTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, GpuError> {
        check_texture_size(device, width.max(height))?;
        let create = |label: &str, format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        Ok(Self {
            color: create("Offscreen Color", COLOR_FORMAT),
            depth: create("Offscreen Depth", DEPTH_FORMAT),
        })
    }
}

/// Runs the configured number of frames.
pub fn run(config: EngineConfig) -> Result<()> {
    pollster::block_on(run_frames(config))
}

async fn run_frames(mut config: EngineConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let ctx = GpuContext::new(config.gpu_validation, false)
        .await
        .context("creating GPU context")?;
    let mut pipeline = FramePipeline::new(&ctx, &config.pipeline_settings(), COLOR_FORMAT)
        .context("building frame pipeline")?;
    pipeline.set_view_proj(&ctx.queue, camera_view_proj(&config));

    let targets = OffscreenTargets::new(&ctx.device, config.render_width, config.render_height)
        .context("creating offscreen targets")?;
    let mut verifier = Verifier::new(&config).context("building reference")?;
    let mut stats = FrameStats::default();

    info!(
        "Running {} frames at {}x{}",
        config.frames, config.render_width, config.render_height
    );

    for _ in 0..config.frames {
        stats.begin_frame();

        let frame = pipeline.advance(&ctx.device, &ctx.queue);
        if frame == 0 {
            on_first_frame(&config, &ctx, &pipeline, &mut verifier);
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        pipeline.present(&mut encoder, &targets.color, &targets.depth);
        ctx.queue.submit(std::iter::once(encoder.finish()));

        if verifier.is_due(frame) {
            verifier.check_particles(&ctx, &pipeline, frame);
        }

        stats.end_frame();
        if frame > 0 && frame % PROGRESS_INTERVAL == 0 {
            info!("Frame {frame}: {:.1} fps", stats.current_fps());
        }
    }
    ctx.device.poll(wgpu::Maintain::Wait);

    info!(
        "Ran {} frames: mean {:.3} ms, max {:.3} ms",
        stats.frames(),
        stats.mean_frame_ms(),
        stats.max_frame_ms()
    );

    let failures = verifier.failure_count();
    if failures > 0 {
        bail!(
            "{failures} of {} verification checks failed",
            verifier.check_count()
        );
    }
    if verifier.check_count() > 0 {
        info!("All {} verification checks passed", verifier.check_count());
    }
    Ok(())
}

/// Height-field snapshot and check, once the bake has been submitted.
fn on_first_frame(
    config: &EngineConfig,
    ctx: &GpuContext,
    pipeline: &FramePipeline,
    verifier: &mut Verifier,
) {
    verifier.check_height(ctx, pipeline, 0);

    let Some(path) = &config.height_snapshot else {
        return;
    };
    let written = pipeline
        .read_height_field(&ctx.device, &ctx.queue)
        .map_err(anyhow::Error::from)
        .and_then(|field| write_height_png(&field, path));
    if let Err(e) = written {
        warn!("Height snapshot skipped: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_sees_origin() {
        let config = EngineConfig::default();
        let clip = camera_view_proj(&config) * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;

        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_camera_sees_feature() {
        let config = EngineConfig::default();
        let clip = camera_view_proj(&config) * glam::Vec4::new(3.0, 0.0, 3.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(clip.w > 0.0);
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
    }

    #[test]
    fn test_offscreen_targets_respect_device_limit() {
        let Ok(ctx) = pollster::block_on(GpuContext::new(true, true)) else {
            return;
        };
        let too_large = ctx.device.limits().max_texture_dimension_2d + 1;
        assert!(matches!(
            OffscreenTargets::new(&ctx.device, too_large, 16),
            Err(GpuError::TextureTooLarge { .. })
        ));
        assert!(matches!(
            OffscreenTargets::new(&ctx.device, 16, too_large),
            Err(GpuError::TextureTooLarge { .. })
        ));
        assert!(OffscreenTargets::new(&ctx.device, 64, 32).is_ok());
    }
}
