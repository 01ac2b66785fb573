//! Double-buffered particle state textures.
//!
//! This module provides the `ParticleStore` type which owns two float targets
//! holding particle positions. The simulation reads the current texture and
//! renders into the writable one, then the roles swap once per frame. A
//! texture is never both the read source and the write target of one step.

use bytemuck::{Pod, Zeroable};
use shoreline_common::{GpuError, ParticleLayout, SeedParams};
use tracing::{debug, info};
use wgpu::{util::DeviceExt, Device};

use crate::compute::SimulationStep;
use crate::fullscreen::FullscreenPass;
use crate::target::{uniform_entry, FloatTarget};

/// Particle index to texel mapping, prepended to every shader that reads or
/// writes particle textures.
///
/// Row-major, matching `shoreline_common::index_to_texel`.
pub const PARTICLE_LAYOUT_WGSL: &str = r"
fn texel_to_index(texel: vec2<u32>, size: u32) -> u32 {
    return texel.y * size + texel.x;
}

fn index_to_texel(index: u32, size: u32) -> vec2<u32> {
    return vec2<u32>(index % size, index / size);
}
";

/// Fragment stage of the seeding pass.
pub(crate) const SEED_SHADER: &str = r"
struct SeedUniform {
    params: vec4<f32>, // x_shift, height_scale, height_bias
    counts: vec4<u32>, // texture_size, count, grid
}

@group(0) @binding(0) var<uniform> seed: SeedUniform;

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    let texel = vec2<u32>(frag.xy);
    let index = texel_to_index(texel, seed.counts.x);
    if (index >= seed.counts.y) {
        return vec4<f32>(0.0);
    }

    let g = seed.counts.z;
    let gz = index / (g * g);
    let rem = index % (g * g);
    let cell = vec3<f32>(f32(rem % g), f32(rem / g), f32(gz));

    let span = f32(g - 1u);
    let y_norm = cell.y / span;
    let p = vec3<f32>(
        cell.x + seed.params.x,
        y_norm * seed.params.y + seed.params.z,
        cell.z,
    ) - vec3<f32>(span * 0.5);
    return vec4<f32>(p, 1.0);
}
";

/// GPU-compatible seeding parameters.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct SeedUniform {
    params: [f32; 4],
    counts: [u32; 4],
}

impl SeedUniform {
    fn new(layout: &ParticleLayout, seed: &SeedParams) -> Self {
        Self {
            params: [seed.x_shift, seed.height_scale, seed.height_bias, 0.0],
            counts: [layout.texture_size(), layout.count(), layout.grid(), 0],
        }
    }
}

/// One of the two state textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    /// Texture A
    A,
    /// Texture B
    B,
}

impl BufferSlot {
    /// The other slot.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Role bookkeeping for the texture pair.
///
/// Between `begin_step` and `swap` the writable slot holds the next state,
/// but presentation still reads the current slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRoles {
    a_is_current: bool,
    swap_pending: bool,
}

impl Default for BufferRoles {
    fn default() -> Self {
        Self {
            a_is_current: true,
            swap_pending: false,
        }
    }
}

impl BufferRoles {
    /// Slot holding the latest complete state.
    #[must_use]
    pub const fn current(&self) -> BufferSlot {
        if self.a_is_current {
            BufferSlot::A
        } else {
            BufferSlot::B
        }
    }

    /// Slot the next step writes.
    #[must_use]
    pub const fn writable(&self) -> BufferSlot {
        self.current().other()
    }

    /// Whether a step has been encoded since the last swap.
    #[must_use]
    pub const fn swap_pending(&self) -> bool {
        self.swap_pending
    }

    /// Marks a step as encoded and returns `(source, target)`.
    ///
    /// # Panics
    /// Panics if a step was already encoded without a swap; a second step
    /// would read a stale source.
    pub fn begin_step(&mut self) -> (BufferSlot, BufferSlot) {
        assert!(
            !self.swap_pending,
            "particle step encoded twice without a swap"
        );
        self.swap_pending = true;
        (self.current(), self.writable())
    }

    /// Exchanges the roles.
    ///
    /// # Panics
    /// Panics if no step was encoded since the last swap.
    pub fn swap(&mut self) {
        assert!(self.swap_pending, "particle swap without a pending step");
        self.a_is_current = !self.a_is_current;
        self.swap_pending = false;
    }

    /// Panics unless `slot` is the current slot.
    pub fn assert_readable(&self, slot: BufferSlot) {
        assert!(
            slot == self.current(),
            "particle buffer {slot:?} read while writable"
        );
    }
}

/// Double-buffered particle state.
pub struct ParticleStore {
    /// Texture A (alternates between current/writable)
    buffer_a: FloatTarget,
    /// Texture B (alternates between current/writable)
    buffer_b: FloatTarget,
    /// Seeding pass, writes A once
    seed_pass: FullscreenPass,
    seed_bind_group: wgpu::BindGroup,
    /// Bind group for A→B steps (read A, write B)
    bind_group_a_to_b: wgpu::BindGroup,
    /// Bind group for B→A steps (read B, write A)
    bind_group_b_to_a: wgpu::BindGroup,
    roles: BufferRoles,
    seeded: bool,
    layout: ParticleLayout,
}

impl ParticleStore {
    /// Allocates both textures and pre-builds the bind groups for each direction.
    ///
    /// # Arguments
    /// * `device` - The wgpu device
    /// * `layout` - Particle count and texture size
    /// * `seed` - Lattice seeding constants
    /// * `step` - Simulation step (for its bind group layout)
    /// * `height` - View of the height field the step samples
    /// * `format` - Float format chosen for the pipeline
    pub fn new(
        device: &Device,
        layout: ParticleLayout,
        seed: &SeedParams,
        step: &SimulationStep,
        height: &wgpu::TextureView,
        format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        let size = layout.texture_size();
        info!(
            "Creating particle state textures ({size}x{size} for {} particles)",
            layout.count()
        );

        let buffer_a = FloatTarget::new(device, "Particle State A", size, format)?;
        let buffer_b = FloatTarget::new(device, "Particle State B", size, format)?;

        let seed_pass = FullscreenPass::new(
            device,
            "Particle Seed",
            &format!("{PARTICLE_LAYOUT_WGSL}\n{SEED_SHADER}"),
            &[uniform_entry(0, wgpu::ShaderStages::FRAGMENT)],
            format,
        );
        let seed_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Seed Params"),
            contents: bytemuck::bytes_of(&SeedUniform::new(&layout, seed)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let seed_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Seed Bind Group"),
            layout: seed_pass.bind_group_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: seed_buffer.as_entire_binding(),
            }],
        });

        let bind_group_a_to_b =
            step.create_bind_group(device, "Particle Step A→B", buffer_a.view(), height);
        let bind_group_b_to_a =
            step.create_bind_group(device, "Particle Step B→A", buffer_b.view(), height);

        Ok(Self {
            buffer_a,
            buffer_b,
            seed_pass,
            seed_bind_group,
            bind_group_a_to_b,
            bind_group_b_to_a,
            roles: BufferRoles::default(),
            seeded: false,
            layout,
        })
    }

    /// Records the seeding pass into A if it has not run yet.
    ///
    /// Returns `true` when this call encoded the seed.
    pub fn encode_seed(&mut self, encoder: &mut wgpu::CommandEncoder) -> bool {
        if self.seeded {
            return false;
        }
        self.seed_pass
            .encode(encoder, self.buffer_a.view(), &self.seed_bind_group);
        self.seeded = true;
        info!("Particle lattice seeded ({} particles)", self.layout.count());
        true
    }

    /// Records one simulation step from the current into the writable texture.
    ///
    /// # Panics
    /// Panics if the store is unseeded or a step is already pending.
    pub fn encode_step(&mut self, encoder: &mut wgpu::CommandEncoder, step: &SimulationStep) {
        assert!(self.seeded, "particle step encoded before seeding");
        let (source, target) = self.roles.begin_step();
        let bind_group = match source {
            BufferSlot::A => &self.bind_group_a_to_b,
            BufferSlot::B => &self.bind_group_b_to_a,
        };
        step.encode(encoder, self.target(target).view(), bind_group);
    }

    /// Exchanges the current and writable roles.
    ///
    /// # Panics
    /// Panics without a pending step.
    pub fn swap(&mut self) {
        self.roles.swap();
        debug!("Particle buffers swapped, current is {:?}", self.roles.current());
    }

    /// Role state.
    #[must_use]
    pub const fn roles(&self) -> &BufferRoles {
        &self.roles
    }

    /// Slot holding the latest complete state.
    #[must_use]
    pub const fn current_slot(&self) -> BufferSlot {
        self.roles.current()
    }

    /// View of the current state texture.
    #[must_use]
    pub fn current_view(&self) -> &wgpu::TextureView {
        self.view(self.current_slot())
    }

    /// The current state texture.
    #[must_use]
    pub fn current_texture(&self) -> &wgpu::Texture {
        self.target(self.current_slot()).texture()
    }

    /// View of `slot`, which must be the current slot.
    ///
    /// # Panics
    /// Panics if `slot` is the writable slot.
    #[must_use]
    pub fn view(&self, slot: BufferSlot) -> &wgpu::TextureView {
        self.roles.assert_readable(slot);
        self.target(slot).view()
    }

    /// Unchecked view of `slot`, for building bind groups ahead of time.
    pub(crate) fn binding_view(&self, slot: BufferSlot) -> &wgpu::TextureView {
        self.target(slot).view()
    }

    /// Whether the seeding pass has been encoded.
    #[must_use]
    pub const fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Particle layout.
    #[must_use]
    pub const fn layout(&self) -> &ParticleLayout {
        &self.layout
    }

    const fn target(&self, slot: BufferSlot) -> &FloatTarget {
        match slot {
            BufferSlot::A => &self.buffer_a,
            BufferSlot::B => &self.buffer_b,
        }
    }
}
