//! Per-frame particle simulation step.
//!
//! A full-screen pass over the writable particle texture. Each fragment loads
//! its particle from the current texture, samples the frozen height field
//! under it and applies the configured surface policy.

use bytemuck::{Pod, Zeroable};
use shoreline_common::{
    DomainConfig, DomainUniform, ParticleLayout, ShorelineResult, SimulationParams,
};
use tracing::info;
use wgpu::{util::DeviceExt, Device};

use crate::buffer::PARTICLE_LAYOUT_WGSL;
use crate::fullscreen::FullscreenPass;
use crate::target::{float_texture_entry, uniform_entry};

/// Fragment stage of the simulation pass.
pub(crate) const SIMULATION_SHADER: &str = r"
struct Domain {
    bounds: vec4<f32>,
    shape: vec4<f32>,
    center: vec4<f32>,
}

struct SimUniform {
    domain: Domain,
    params: vec4<f32>, // drift_step, policy value
    counts: vec4<u32>, // texture_size, count, policy mode
}

@group(0) @binding(0) var<uniform> sim: SimUniform;
@group(0) @binding(1) var src_tex: texture_2d<f32>;
@group(0) @binding(2) var height_tex: texture_2d<f32>;

fn surface_height(x: f32, z: f32) -> f32 {
    let b = sim.domain.bounds;
    let uv = clamp(
        vec2<f32>((x - b.x) / (b.y - b.x), (z - b.z) / (b.w - b.z)),
        vec2<f32>(0.0),
        vec2<f32>(1.0),
    );
    let dims = textureDimensions(height_tex);
    let texel = min(vec2<u32>(floor(uv * vec2<f32>(dims))), dims - vec2<u32>(1u));
    return textureLoad(height_tex, texel, 0).x;
}

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<u32>(frag.xy);
    let index = texel_to_index(texel, sim.counts.x);
    if (index >= sim.counts.y) {
        return vec4<f32>(0.0);
    }

    let p = textureLoad(src_tex, texel, 0).xyz;
    let h = surface_height(p.x, p.z);
    let drift = sim.params.x;

    var next = p;
    switch sim.counts.z {
        case 1u: {
            if (p.y < h) {
                next.y = h + sim.params.y;
            } else {
                next.x = p.x - drift;
            }
        }
        case 2u: {
            if (p.y < h) {
                next.y = sim.params.y;
            } else {
                next.x = p.x - drift;
            }
        }
        default: {
            next.x = p.x - drift;
            next.y = h;
        }
    }
    return vec4<f32>(next, 1.0);
}
";

/// GPU-compatible simulation parameters.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct SimUniform {
    /// Domain rectangle and height parameters
    pub domain: DomainUniform,
    /// drift_step, policy value, unused, unused
    pub params: [f32; 4],
    /// texture_size, count, policy mode, unused
    pub counts: [u32; 4],
}

impl SimUniform {
    /// Packs the step parameters for a layout.
    #[must_use]
    pub fn new(domain: &DomainConfig, layout: &ParticleLayout, params: &SimulationParams) -> Self {
        let (mode, value) = params.policy.gpu_mode();
        Self {
            domain: DomainUniform::from(domain),
            params: [params.drift_step, value, 0.0, 0.0],
            counts: [layout.texture_size(), layout.count(), mode, 0],
        }
    }
}

/// The simulation pass and its parameters.
pub struct SimulationStep {
    pass: FullscreenPass,
    uniform_buffer: wgpu::Buffer,
    params: SimulationParams,
}

impl SimulationStep {
    /// Compiles the step for a layout.
    pub fn new(
        device: &Device,
        domain: &DomainConfig,
        layout: &ParticleLayout,
        params: &SimulationParams,
        format: wgpu::TextureFormat,
    ) -> ShorelineResult<Self> {
        params.validate()?;

        let pass = FullscreenPass::new(
            device,
            "Particle Simulation",
            &format!("{PARTICLE_LAYOUT_WGSL}\n{SIMULATION_SHADER}"),
            &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                float_texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                float_texture_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
            format,
        );

        let uniform = SimUniform::new(domain, layout, params);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        info!(
            "Simulation step created (drift {}, policy {:?})",
            params.drift_step, params.policy
        );

        Ok(Self {
            pass,
            uniform_buffer,
            params: *params,
        })
    }

    /// Creates a bind group reading `src` and the height field.
    pub fn create_bind_group(
        &self,
        device: &Device,
        label: &str,
        src: &wgpu::TextureView,
        height: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: self.pass.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(height),
                },
            ],
        })
    }

    /// Records one step writing into `target`.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
    ) {
        self.pass.encode(encoder, target, bind_group);
    }

    /// Parameters the step was built with.
    #[must_use]
    pub const fn params(&self) -> &SimulationParams {
        &self.params
    }
}
