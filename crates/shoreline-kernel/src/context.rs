//! Headless GPU device setup.

use shoreline_common::GpuError;
use tracing::info;

use crate::validation::{create_validated_instance, handle_device_error};

/// Adapter, device and queue used by every pipeline pass.
pub struct GpuContext {
    /// Adapter the device was created from (format capability queries)
    pub adapter: wgpu::Adapter,
    /// The wgpu device
    pub device: wgpu::Device,
    /// The queue all passes are submitted to, in frame order
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Requests a surfaceless adapter and device.
    ///
    /// # Arguments
    /// * `validation` - Enable wgpu validation layers
    /// * `force_fallback_adapter` - Use the software adapter
    pub async fn new(validation: bool, force_fallback_adapter: bool) -> Result<Self, GpuError> {
        let instance = create_validated_instance(validation);

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .ok_or_else(|| GpuError::InitFailed("no suitable GPU adapter".to_string()))?;

        let adapter_info = adapter.get_info();
        info!(
            "Using adapter {} ({:?}, {:?})",
            adapter_info.name, adapter_info.device_type, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Shoreline Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| GpuError::InitFailed(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|e| handle_device_error(&e)));

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

/// Software adapter for tests; `None` when the machine has none.
#[cfg(test)]
pub(crate) fn create_test_context() -> Option<GpuContext> {
    pollster::block_on(GpuContext::new(true, true)).ok()
}

/// Software adapter that can render to `Rgba32Float`, for tests that read back.
#[cfg(test)]
pub(crate) fn create_test_context_full() -> Option<(GpuContext, wgpu::TextureFormat)> {
    let ctx = create_test_context()?;
    let format = crate::target::select_float_format(
        &ctx.adapter,
        shoreline_common::TexelPrecision::Full,
        None,
    )
    .ok()?;
    Some((ctx, format))
}
