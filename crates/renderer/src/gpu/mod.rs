//! GPU side of the depth photo renderer.
//!
//! - `context` owns the wgpu instance, device, and surface for the window and
//!   reconfigures the swapchain on resize.
//! - `textures` uploads the decoded colour image and depth map.
//! - `pipeline` turns two linked shader programs into render pipelines with
//!   prebuilt bind groups and draws the photo quad each frame.
//! - `uniforms` holds the matrix helpers and the CPU copy of the transform
//!   block, written at the offsets reflection reported.
//! - `error` wraps GPU calls in error scopes so failures surface as values.

mod context;
mod error;
mod pipeline;
mod textures;
pub(crate) mod uniforms;

pub(crate) use context::GpuContext;
pub use error::{GpuErrorKind, RenderError};
pub(crate) use pipeline::draw_empty_frame;
pub use pipeline::DepthPipeline;

/// Device on whatever adapter the machine offers, or `None` on hosts with no
/// GPU backend at all.
#[cfg(test)]
pub(crate) fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    });
    let adapter =
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .ok()?;
    pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).ok()
}
