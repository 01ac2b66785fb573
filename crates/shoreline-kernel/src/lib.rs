//! # Shoreline Kernel
//!
//! GPU texture pipeline for the shoreline particle field.
//!
//! This crate provides the `wgpu` side of the system:
//! - Float render targets used as general-purpose data buffers
//! - Full-screen passes that evaluate one fragment per texel
//! - One-shot height-field bake
//! - Double-buffered particle state with a per-frame simulation step
//! - Instanced particle presentation
//! - Texture readback and GPU validation harness
//!
//! ## Frame Order
//!
//! The height field is baked once, on frame 0, and frozen. Every frame then
//! simulates into the writable particle texture, swaps, and presents from
//! the current one. All passes are submitted to a single queue, so the
//! queue order is the only synchronization needed.
//!
//! ## Double Buffering
//!
//! - Two particle textures alternate between current (read) and writable
//! - Each step reads the current texture and renders into the writable one
//! - Roles swap exactly once per frame, after the step
//!
//! ## Validation
//!
//! In debug builds, wgpu validation is enabled to catch GPU errors early.
//! Use `create_validated_instance()` to create a wgpu instance with appropriate settings.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod buffer;
pub mod compute;
pub mod context;
pub mod fullscreen;
pub mod heightfield;
pub mod pipeline;
pub mod readback;
pub mod render;
pub mod target;
pub mod validation;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::*;
    pub use crate::compute::*;
    pub use crate::context::*;
    pub use crate::fullscreen::*;
    pub use crate::heightfield::*;
    pub use crate::pipeline::*;
    pub use crate::readback::*;
    pub use crate::render::*;
    pub use crate::target::*;
    pub use crate::validation::*;
}

pub use prelude::*;
