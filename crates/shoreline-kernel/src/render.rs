//! Instanced particle presentation.
//!
//! Draws one shared sphere per particle. Instances carry only their particle
//! index; the vertex shader fetches the position from the current state
//! texture, so presentation never touches simulation state.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use tracing::info;
use wgpu::{util::DeviceExt, Device, Queue};

use crate::buffer::{BufferSlot, ParticleStore, PARTICLE_LAYOUT_WGSL};
use crate::target::{float_texture_entry, uniform_entry};

/// Depth format of the presentation pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Sphere tessellation.
const SPHERE_SEGMENTS: u32 = 16;
const SPHERE_RINGS: u32 = 8;

pub(crate) const PARTICLE_SHADER: &str = r"
struct PresentUniform {
    view_proj: mat4x4<f32>,
    texture_size: u32,
    count: u32,
    scale: f32,
    _pad: u32,
}

@group(0) @binding(0) var<uniform> uniforms: PresentUniform;
@group(0) @binding(1) var particle_tex: texture_2d<f32>;

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) particle: u32,
) -> @builtin(position) vec4<f32> {
    if (particle >= uniforms.count) {
        // Padding never reaches the rasterizer
        return vec4<f32>(0.0);
    }
    let texel = index_to_texel(particle, uniforms.texture_size);
    let center = textureLoad(particle_tex, texel, 0).xyz;
    return uniforms.view_proj * vec4<f32>(center + position * uniforms.scale, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.0, 1.0, 0.0, 1.0);
}
";

/// GPU-compatible presentation parameters.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PresentUniform {
    /// Column-major view-projection matrix
    pub view_proj: [[f32; 4]; 4],
    /// Edge length of the particle textures
    pub texture_size: u32,
    /// Live particle count
    pub count: u32,
    /// Sphere diameter
    pub scale: f32,
    _pad: u32,
}

/// Unit-diameter UV sphere as positions and triangle indices.
#[must_use]
pub fn sphere_mesh(segments: u32, rings: u32) -> (Vec<[f32; 3]>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        for segment in 0..=segments {
            let theta = std::f32::consts::TAU * segment as f32 / segments as f32;
            vertices.push([
                0.5 * phi.sin() * theta.cos(),
                0.5 * phi.cos(),
                0.5 * phi.sin() * theta.sin(),
            ]);
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::with_capacity((segments * rings * 6) as usize);
    for ring in 0..rings {
        for segment in 0..segments {
            let a = (ring * stride + segment) as u16;
            let b = a + stride as u16;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    (vertices, indices)
}

/// Instanced sphere renderer reading the current particle texture.
pub struct ParticlePresenter {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform: PresentUniform,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    instance_buffer: wgpu::Buffer,
    /// Bind group reading texture A
    bind_group_a: wgpu::BindGroup,
    /// Bind group reading texture B
    bind_group_b: wgpu::BindGroup,
}

impl ParticlePresenter {
    /// Builds the pipeline and one bind group per state texture.
    ///
    /// # Arguments
    /// * `device` - The wgpu device
    /// * `store` - Particle store whose textures are presented
    /// * `diameter` - Sphere diameter in world units
    /// * `color_format` - Format of the color target drawn into
    pub fn new(
        device: &Device,
        store: &ParticleStore,
        diameter: f32,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Present Shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{PARTICLE_LAYOUT_WGSL}\n{PARTICLE_SHADER}").into(),
            ),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Present Bind Group Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                float_texture_entry(1, wgpu::ShaderStages::VERTEX),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Present Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Present Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: 4,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Uint32,
                            offset: 0,
                            shader_location: 1,
                        }],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let (vertices, indices) = sphere_mesh(SPHERE_SEGMENTS, SPHERE_RINGS);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Sphere Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Sphere Indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let layout = store.layout();
        let particle_ids: Vec<u32> = (0..layout.count()).collect();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Instance Indices"),
            contents: bytemuck::cast_slice(&particle_ids),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform = PresentUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            texture_size: layout.texture_size(),
            count: layout.count(),
            scale: diameter,
            _pad: 0,
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Present Params"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let create_bind_group = |slot: BufferSlot, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(store.binding_view(slot)),
                    },
                ],
            })
        };
        let bind_group_a = create_bind_group(BufferSlot::A, "Particle Present A");
        let bind_group_b = create_bind_group(BufferSlot::B, "Particle Present B");

        info!(
            "Particle presenter created ({} instances, {} indices per sphere)",
            layout.count(),
            indices.len()
        );

        Self {
            pipeline,
            uniform_buffer,
            uniform,
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            instance_buffer,
            bind_group_a,
            bind_group_b,
        }
    }

    /// Uploads a new view-projection matrix.
    pub fn set_view_proj(&mut self, queue: &Queue, view_proj: Mat4) {
        self.uniform.view_proj = view_proj.to_cols_array_2d();
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniform));
    }

    /// Draws every particle from the store's current texture.
    ///
    /// # Panics
    /// Panics if the chosen texture is not the current one.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>, store: &ParticleStore) {
        let slot = store.current_slot();
        store.roles().assert_readable(slot);
        let bind_group = match slot {
            BufferSlot::A => &self.bind_group_a,
            BufferSlot::B => &self.bind_group_b,
        };

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..self.index_count, 0, 0..self.uniform.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_uniform_size() {
        assert_eq!(std::mem::size_of::<PresentUniform>(), 80);
    }

    #[test]
    fn test_sphere_mesh_counts() {
        let (vertices, indices) = sphere_mesh(16, 8);
        assert_eq!(vertices.len(), 17 * 9);
        assert_eq!(indices.len(), 16 * 8 * 6);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }

    #[test]
    fn test_sphere_has_unit_diameter() {
        let (vertices, _) = sphere_mesh(12, 6);
        for v in &vertices {
            let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((r - 0.5).abs() < 1e-5);
        }
    }
}
