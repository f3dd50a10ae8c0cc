//! Boundary between the window host and whatever draws into its surface.
//!
//! The host owns the window, the device, and the swapchain. It calls the
//! [`SurfaceEvents`] hooks from its event-loop thread: `created` once the
//! device exists (and again after a new photo replaces the pipeline),
//! `resized` whenever the surface changes size, and `draw_frame` once per
//! presented frame.
use crate::gpu::RenderError;

/// Borrowed GPU handles for one callback.
#[derive(Clone, Copy)]
pub struct GpuTarget<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub format: wgpu::TextureFormat,
    pub size: (u32, u32),
}

pub trait SurfaceEvents {
    fn created(&mut self, target: &GpuTarget<'_>) -> Result<(), RenderError>;

    fn resized(&mut self, width: u32, height: u32);

    fn draw_frame(
        &mut self,
        target: &GpuTarget<'_>,
        view: &wgpu::TextureView,
    ) -> Result<(), RenderError>;
}
