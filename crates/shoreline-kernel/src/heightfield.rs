//! One-shot height-field bake.
//!
//! The baker evaluates the analytic beach function into a float target with a
//! single full-screen pass, then freezes: the pass is never encoded again and
//! the texture is only read from that point on.

use bytemuck::{Pod, Zeroable};
use shoreline_common::{ConfigError, DomainConfig, DomainUniform, ShorelineResult};
use tracing::info;
use wgpu::{util::DeviceExt, Device, Queue};

use crate::fullscreen::FullscreenPass;
use crate::target::{uniform_entry, FloatTarget};

/// Fragment stage of the bake pass.
const BAKE_SHADER: &str = r"
struct Domain {
    bounds: vec4<f32>, // min_x, max_x, min_z, max_z
    shape: vec4<f32>,  // slope, offset, feature_x_min, feature_x_max
    center: vec4<f32>, // feature_center_x, feature_center_z
}

struct BakeParams {
    domain: Domain,
    resolution: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: BakeParams;

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let d = params.domain;
    let uv = frag.xy / params.resolution.x;

    let x = mix(d.bounds.x, d.bounds.y, uv.x);
    let z = mix(d.bounds.z, d.bounds.w, uv.y);

    let default_height = d.shape.x * (-x) - d.shape.y;

    var y = default_height;
    if (x >= d.shape.z && x <= d.shape.w) {
        let a = cos(x - d.center.x);
        let b = cos(z - d.center.y);
        y = max(default_height, a + b - 2.0);
    }

    // g keeps the plain beach height for downstream feature masking
    return vec4<f32>(y, default_height, 0.0, 1.0);
}
";

/// GPU-compatible bake parameters.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct BakeParams {
    domain: DomainUniform,
    resolution: [f32; 4],
}

/// Bake lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeState {
    /// Target allocated, contents undefined
    Pending,
    /// Bake submitted; contents frozen
    Baked,
}

/// Owns the height-field texture and the pass that fills it.
pub struct HeightFieldBaker {
    /// Height texture (r = height, g = beach height)
    target: FloatTarget,
    /// Bake pass
    pass: FullscreenPass,
    /// Bind group for the bake pass
    bind_group: wgpu::BindGroup,
    /// Domain the field is baked for
    config: DomainConfig,
    /// Lifecycle
    state: BakeState,
}

impl HeightFieldBaker {
    /// Allocates the height target and compiles the bake pass.
    ///
    /// # Arguments
    /// * `device` - The wgpu device
    /// * `config` - Domain and height-function parameters
    /// * `resolution` - Texture edge length, must be positive
    /// * `format` - Float format chosen for the pipeline
    pub fn new(
        device: &Device,
        config: &DomainConfig,
        resolution: u32,
        format: wgpu::TextureFormat,
    ) -> ShorelineResult<Self> {
        if resolution == 0 {
            return Err(ConfigError::InvalidResolution(resolution).into());
        }
        config.validate()?;

        let target = FloatTarget::new(device, "Height Field", resolution, format)?;
        let pass = FullscreenPass::new(
            device,
            "Height Bake",
            BAKE_SHADER,
            &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
            format,
        );

        let params = BakeParams {
            domain: DomainUniform::from(config),
            resolution: [resolution as f32, 0.0, 0.0, 0.0],
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Height Bake Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Height Bake Bind Group"),
            layout: pass.bind_group_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        info!("Height field target allocated ({resolution}x{resolution})");

        Ok(Self {
            target,
            pass,
            bind_group,
            config: *config,
            state: BakeState::Pending,
        })
    }

    /// Runs the bake if it has not run yet.
    ///
    /// Returns `true` when this call performed the bake. Later calls do
    /// nothing, so the pass drops out of the frame loop after one execution.
    pub fn bake(&mut self, device: &Device, queue: &Queue) -> bool {
        if self.state == BakeState::Baked {
            return false;
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Height Bake Encoder"),
        });
        self.pass.encode(&mut encoder, self.target.view(), &self.bind_group);
        queue.submit(std::iter::once(encoder.finish()));

        // Later submissions on this queue observe the finished bake
        self.state = BakeState::Baked;
        info!(
            "Height field baked ({0}x{0}), frozen",
            self.target.size()
        );
        true
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> BakeState {
        self.state
    }

    /// Whether the bake has been submitted.
    #[must_use]
    pub fn is_baked(&self) -> bool {
        self.state == BakeState::Baked
    }

    /// Domain the field was baked for.
    #[must_use]
    pub const fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// Edge length in texels.
    #[must_use]
    pub const fn resolution(&self) -> u32 {
        self.target.size()
    }

    /// The frozen height texture.
    ///
    /// # Panics
    /// Panics if read before the bake; that breaks frame ordering.
    #[must_use]
    pub fn texture(&self) -> &wgpu::Texture {
        self.assert_baked();
        self.target.texture()
    }

    /// View of the frozen height texture for ground displacement or sampling.
    ///
    /// # Panics
    /// Panics if read before the bake.
    #[must_use]
    pub fn view(&self) -> &wgpu::TextureView {
        self.assert_baked();
        self.target.view()
    }

    /// View for building bind groups ahead of the bake.
    ///
    /// Binding does not read; the first pass using it is ordered after the bake.
    pub(crate) fn binding_view(&self) -> &wgpu::TextureView {
        self.target.view()
    }

    fn assert_baked(&self) {
        assert_baked(self.state);
    }
}

fn assert_baked(state: BakeState) {
    assert!(
        state == BakeState::Baked,
        "height field read before the bake completed"
    );
}
