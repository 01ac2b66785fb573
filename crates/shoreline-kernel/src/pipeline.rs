//! Frame sequencing for the bake, simulation and presentation passes.
//!
//! Every frame runs `advance` then `present`:
//!
//! ```text
//! Idle ─▶ Bake (frame 0 only) ─▶ Simulate(n) ─▶ Swap(n) ─▶ Present(n) ─┐
//!                                    ▲                                 │
//!                                    └─────────────────────────────────┘
//! ```
//!
//! All passes go to one queue in this order, which is the only
//! synchronization the pipeline relies on.

use glam::Mat4;
use shoreline_common::{
    DomainConfig, HeightField, ParticleLayout, ParticleSnapshot, SeedParams, ShorelineResult,
    SimulationParams, TexelPrecision,
};
use tracing::info;
use wgpu::{Device, Queue};

use crate::buffer::ParticleStore;
use crate::compute::SimulationStep;
use crate::context::GpuContext;
use crate::heightfield::HeightFieldBaker;
use crate::readback::read_rgba32f;
use crate::render::ParticlePresenter;
use crate::target::select_float_format;

/// Background of the presentation pass.
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.07,
    b: 0.12,
    a: 1.0,
};

/// Everything needed to build a [`FramePipeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Domain rectangle and height parameters
    pub domain: DomainConfig,
    /// Height-field edge length in texels
    pub height_resolution: u32,
    /// Particle lattice edge length
    pub grid: u32,
    /// Particle texture edge length; `None` picks the smallest that fits
    pub texture_size: Option<u32>,
    /// Lattice seeding constants
    pub seed: SeedParams,
    /// Update rule
    pub simulation: SimulationParams,
    /// Requested float precision
    pub precision: TexelPrecision,
    /// Precision to use when the requested one is unsupported
    pub fallback_precision: Option<TexelPrecision>,
    /// Sphere diameter in world units
    pub particle_diameter: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            domain: DomainConfig::default(),
            height_resolution: 512,
            grid: 10,
            texture_size: None,
            seed: SeedParams::default(),
            simulation: SimulationParams::default(),
            precision: TexelPrecision::Full,
            fallback_precision: None,
            particle_diameter: 0.1,
        }
    }
}

impl PipelineSettings {
    /// Particle layout for these settings.
    pub fn layout(&self) -> ShorelineResult<ParticleLayout> {
        let layout = match self.texture_size {
            Some(size) => ParticleLayout::with_texture_size(self.grid, size)?,
            None => ParticleLayout::new(self.grid)?,
        };
        Ok(layout)
    }

    /// Runs every configuration check.
    pub fn validate(&self) -> ShorelineResult<()> {
        self.domain.validate()?;
        self.simulation.validate()?;
        if self.height_resolution == 0 {
            return Err(shoreline_common::ConfigError::InvalidResolution(0).into());
        }
        if !self.particle_diameter.is_finite() {
            return Err(shoreline_common::ConfigError::NonFinite("particle_diameter").into());
        }
        self.layout()?;
        Ok(())
    }
}

/// Where the pipeline is in its frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Built, nothing submitted
    Idle,
    /// `frame` has been simulated and swapped
    Steady {
        /// Index of the last advanced frame
        frame: u64,
    },
}

impl PipelinePhase {
    /// Steps completed so far.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        match self {
            Self::Idle => 0,
            Self::Steady { frame } => *frame + 1,
        }
    }
}

fn assert_presentable(phase: PipelinePhase) {
    assert!(
        phase != PipelinePhase::Idle,
        "particles presented before the first frame advanced"
    );
}

/// The whole GPU pipeline: height bake, particle store, step and presenter.
pub struct FramePipeline {
    baker: HeightFieldBaker,
    step: SimulationStep,
    store: ParticleStore,
    presenter: ParticlePresenter,
    settings: PipelineSettings,
    phase: PipelinePhase,
}

impl FramePipeline {
    /// Validates the settings, picks the float format and builds every pass.
    ///
    /// # Arguments
    /// * `ctx` - GPU context
    /// * `settings` - Pipeline configuration
    /// * `color_format` - Format of the color target `present` draws into
    pub fn new(
        ctx: &GpuContext,
        settings: &PipelineSettings,
        color_format: wgpu::TextureFormat,
    ) -> ShorelineResult<Self> {
        settings.validate()?;
        let layout = settings.layout()?;
        let format = select_float_format(
            &ctx.adapter,
            settings.precision,
            settings.fallback_precision,
        )?;

        let baker = HeightFieldBaker::new(
            &ctx.device,
            &settings.domain,
            settings.height_resolution,
            format,
        )?;
        let step = SimulationStep::new(
            &ctx.device,
            &settings.domain,
            &layout,
            &settings.simulation,
            format,
        )?;
        let store = ParticleStore::new(
            &ctx.device,
            layout,
            &settings.seed,
            &step,
            baker.binding_view(),
            format,
        )?;
        let presenter =
            ParticlePresenter::new(&ctx.device, &store, settings.particle_diameter, color_format);

        info!(
            "Frame pipeline ready: height {0}x{0}, {1} particles in {2}x{2} textures",
            settings.height_resolution,
            layout.count(),
            layout.texture_size()
        );

        Ok(Self {
            baker,
            step,
            store,
            presenter,
            settings: *settings,
            phase: PipelinePhase::Idle,
        })
    }

    /// Runs one frame's GPU work and swaps the particle buffers.
    ///
    /// Frame 0 also bakes the height field and seeds the particles, both
    /// submitted ahead of the first step. Returns the frame index.
    pub fn advance(&mut self, device: &Device, queue: &Queue) -> u64 {
        self.baker.bake(device, queue);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        self.store.encode_seed(&mut encoder);
        self.store.encode_step(&mut encoder, &self.step);
        queue.submit(std::iter::once(encoder.finish()));
        self.store.swap();

        let frame = match self.phase {
            PipelinePhase::Idle => 0,
            PipelinePhase::Steady { frame } => frame + 1,
        };
        self.phase = PipelinePhase::Steady { frame };
        frame
    }

    /// Draws the particles from the current buffer.
    ///
    /// # Panics
    /// Panics before the first `advance`.
    pub fn present(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
    ) {
        assert_presentable(self.phase);

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Present Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.presenter.render(&mut render_pass, &self.store);
    }

    /// Uploads the camera matrix used by `present`.
    pub fn set_view_proj(&mut self, queue: &Queue, view_proj: Mat4) {
        self.presenter.set_view_proj(queue, view_proj);
    }

    /// Frame-cycle state.
    #[must_use]
    pub const fn phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Particle layout.
    #[must_use]
    pub const fn layout(&self) -> &ParticleLayout {
        self.store.layout()
    }

    /// Settings the pipeline was built with.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// The frozen height field, e.g. for ground displacement.
    ///
    /// # Panics
    /// Panics before the first `advance`.
    #[must_use]
    pub fn height_view(&self) -> &wgpu::TextureView {
        self.baker.view()
    }

    /// The particle texture presentation reads this frame.
    ///
    /// # Panics
    /// Panics before the first `advance`.
    #[must_use]
    pub fn current_particle_view(&self) -> &wgpu::TextureView {
        assert_presentable(self.phase);
        self.store.current_view()
    }

    /// Copies the baked height field back to the CPU.
    pub fn read_height_field(&self, device: &Device, queue: &Queue) -> ShorelineResult<HeightField> {
        let resolution = self.baker.resolution();
        let texels = read_rgba32f(device, queue, self.baker.texture(), resolution)?;
        Ok(HeightField::from_texels(
            self.baker.config(),
            resolution,
            &texels,
        ))
    }

    /// Copies the current particle state back to the CPU.
    pub fn read_particles(&self, device: &Device, queue: &Queue) -> ShorelineResult<ParticleSnapshot> {
        assert_presentable(self.phase);
        let layout = *self.store.layout();
        let texels = read_rgba32f(
            device,
            queue,
            self.store.current_texture(),
            layout.texture_size(),
        )?;
        Ok(ParticleSnapshot::from_texels(layout, texels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferSlot;
    use crate::context::create_test_context_full;
    use crate::render::DEPTH_FORMAT;
    use crate::validation::compare_texels;
    use shoreline_common::{ConfigError, ShorelineError, SurfacePolicy};

    fn small_settings() -> PipelineSettings {
        PipelineSettings {
            height_resolution: 64,
            grid: 4,
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn test_phase_steps() {
        assert_eq!(PipelinePhase::Idle.steps(), 0);
        assert_eq!(PipelinePhase::Steady { frame: 0 }.steps(), 1);
        assert_eq!(PipelinePhase::Steady { frame: 9 }.steps(), 10);
    }

    #[test]
    #[should_panic(expected = "before the first frame")]
    fn test_present_before_advance_panics() {
        assert_presentable(PipelinePhase::Idle);
    }

    #[test]
    fn test_settings_validation() {
        let settings = PipelineSettings {
            grid: 1,
            ..PipelineSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ShorelineError::Config(ConfigError::GridTooSmall(1)))
        ));

        let settings = PipelineSettings {
            texture_size: Some(8),
            ..PipelineSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ShorelineError::Config(ConfigError::TextureTooSmall { .. }))
        ));

        assert!(PipelineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_default_layout_matches_lattice() {
        let layout = PipelineSettings::default().layout().expect("layout");
        assert_eq!(layout.count(), 1000);
        assert_eq!(layout.texture_size(), 32);
    }

    #[test]
    fn test_advance_swaps_roles() {
        let Some((ctx, _)) = create_test_context_full() else {
            return;
        };
        let mut pipeline = FramePipeline::new(
            &ctx,
            &small_settings(),
            wgpu::TextureFormat::Rgba8UnormSrgb,
        )
        .expect("pipeline");
        assert_eq!(pipeline.phase(), PipelinePhase::Idle);
        assert!(!pipeline.baker.is_baked());
        assert!(!pipeline.store.is_seeded());

        assert_eq!(pipeline.advance(&ctx.device, &ctx.queue), 0);
        assert!(pipeline.baker.is_baked());
        assert!(pipeline.store.is_seeded());
        assert_eq!(pipeline.store.current_slot(), BufferSlot::B);
        assert_eq!(pipeline.advance(&ctx.device, &ctx.queue), 1);
        assert_eq!(pipeline.store.current_slot(), BufferSlot::A);
        assert_eq!(pipeline.phase(), PipelinePhase::Steady { frame: 1 });
    }

    #[test]
    fn test_frames_match_reference() {
        let Some((ctx, _)) = create_test_context_full() else {
            return;
        };
        // Lattice starts below the surface so every policy branch runs
        let seed = SeedParams {
            x_shift: 0.0,
            height_bias: -5.0,
            ..SeedParams::default()
        };
        let policies = [
            SurfacePolicy::Snap,
            SurfacePolicy::Lift { lift: 0.05 },
            SurfacePolicy::Teleport { height: 10.0 },
        ];

        for policy in policies {
            let settings = PipelineSettings {
                seed,
                simulation: SimulationParams {
                    policy,
                    ..SimulationParams::default()
                },
                ..small_settings()
            };
            let mut pipeline =
                FramePipeline::new(&ctx, &settings, wgpu::TextureFormat::Rgba8UnormSrgb)
                    .expect("pipeline");

            let height = HeightField::bake_reference(&settings.domain, settings.height_resolution)
                .expect("reference");
            let mut expected = ParticleSnapshot::seeded(*pipeline.layout(), &settings.seed);
            for _ in 0..5 {
                pipeline.advance(&ctx.device, &ctx.queue);
                expected = expected.advance(&height, &settings.simulation);
            }

            let actual = pipeline
                .read_particles(&ctx.device, &ctx.queue)
                .expect("readback");
            let comparison = compare_texels(
                expected.texels(),
                actual.texels(),
                1e-3,
                actual.layout().count() as usize,
            );
            assert!(comparison.passed(), "{policy:?}: {comparison:?}");

            let baked = pipeline
                .read_height_field(&ctx.device, &ctx.queue)
                .expect("height readback");
            let comparison = compare_texels(
                &height.to_texels(),
                &baked.to_texels(),
                1e-4,
                usize::MAX,
            );
            assert!(comparison.passed(), "{comparison:?}");
        }
    }

    #[test]
    fn test_seed_starts_below_surface() {
        // Guards the lattice used above: the below-surface branches only run
        // if every seeded particle starts under the height field.
        let settings = PipelineSettings {
            seed: SeedParams {
                x_shift: 0.0,
                height_bias: -5.0,
                ..SeedParams::default()
            },
            ..small_settings()
        };
        let height = HeightField::bake_reference(&settings.domain, settings.height_resolution)
            .expect("reference");
        let snapshot = ParticleSnapshot::seeded(settings.layout().expect("layout"), &settings.seed);
        for p in snapshot.positions() {
            assert!(p.y < height.sample_world(p.x, p.z).height);
        }
    }

    #[test]
    fn test_padding_texels_stay_zero() {
        let Some((ctx, _)) = create_test_context_full() else {
            return;
        };
        // 27 particles in a 6x6 texture
        let settings = PipelineSettings {
            grid: 3,
            texture_size: Some(6),
            ..small_settings()
        };
        let mut pipeline =
            FramePipeline::new(&ctx, &settings, wgpu::TextureFormat::Rgba8UnormSrgb)
                .expect("pipeline");
        pipeline.advance(&ctx.device, &ctx.queue);

        let snapshot = pipeline
            .read_particles(&ctx.device, &ctx.queue)
            .expect("readback");
        for texel in &snapshot.texels()[27..] {
            assert_eq!(*texel, [0.0; 4]);
        }
        for texel in &snapshot.texels()[..27] {
            assert_eq!(texel[3], 1.0);
        }
    }

    #[test]
    fn test_present_draws() {
        let Some((ctx, _)) = create_test_context_full() else {
            return;
        };
        let color_format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let mut pipeline =
            FramePipeline::new(&ctx, &small_settings(), color_format).expect("pipeline");
        pipeline.advance(&ctx.device, &ctx.queue);

        let extent = wgpu::Extent3d {
            width: 64,
            height: 64,
            depth_or_array_layers: 1,
        };
        let make_target = |format, label| {
            ctx.device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: extent,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let color = make_target(color_format, "Test Color");
        let depth = make_target(DEPTH_FORMAT, "Test Depth");

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        pipeline.present(&mut encoder, &color, &depth);
        ctx.queue.submit(std::iter::once(encoder.finish()));
        ctx.device.poll(wgpu::Maintain::Wait);

        // Current view is still readable after presenting
        let _ = pipeline.current_particle_view();
        let _ = pipeline.height_view();
    }
}
