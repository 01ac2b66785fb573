//! Full-screen passes: the rasterizer as a per-texel dispatcher.
//!
//! A full-screen pass draws one oversized triangle into a float target so the
//! fragment stage runs exactly once per texel. The fragment shader receives
//! the texel centre in `@builtin(position)` and returns the texel's value.

use tracing::debug;
use wgpu::Device;

/// Vertex stage shared by every full-screen pass.
pub const FULLSCREEN_VERTEX: &str = r"
@vertex
fn vs_fullscreen(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    // Fullscreen triangle: (-1,-1), (3,-1), (-1,3)
    let x = f32(i32(vertex_index & 1u) * 4 - 1);
    let y = f32(i32(vertex_index >> 1u) * 4 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}
";

/// A render pipeline that evaluates one fragment per texel of its target.
pub struct FullscreenPass {
    /// Label used for encoder passes
    label: String,
    /// Render pipeline
    pipeline: wgpu::RenderPipeline,
    /// Bind group layout for group 0
    bind_group_layout: wgpu::BindGroupLayout,
}

impl FullscreenPass {
    /// Builds a pass from a fragment shader with entry point `fs_main`.
    ///
    /// # Arguments
    /// * `device` - The wgpu device
    /// * `label` - Debug label
    /// * `fragment_source` - WGSL with `fs_main(@builtin(position) vec4<f32>) -> @location(0) vec4<f32>`
    /// * `entries` - Bind group layout entries for group 0
    /// * `format` - Float format of the targets this pass writes
    pub fn new(
        device: &Device,
        label: &str,
        fragment_source: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
        format: wgpu::TextureFormat,
    ) -> Self {
        let source = format!("{FULLSCREEN_VERTEX}\n{fragment_source}");
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} Bind Group Layout")),
            entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                // Float targets are not blendable; each texel is overwritten
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
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
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        debug!("Created full-screen pass {label}");

        Self {
            label: label.to_string(),
            pipeline,
            bind_group_layout,
        }
    }

    /// Bind group layout for group 0.
    #[must_use]
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Records the pass: every texel of `target` is rewritten.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        bind_group: &wgpu::BindGroup,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
