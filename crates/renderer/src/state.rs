//! Per-session render state that does not touch the GPU.
//!
//! `RenderState` owns the fitted viewport and the camera matrices and turns
//! the live [`Controls`] into a [`FrameParams`] snapshot for each frame.
use std::sync::Arc;

use crate::gpu::uniforms::{self, Mat4};
use crate::input::Controls;
use crate::viewport::{fit_viewport, Viewport};

/// Which linked program draws the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramVariant {
    Plain,
    Blur,
}

/// What is bound to texture unit 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimaryTexture {
    Colour,
    Depth,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameParams {
    pub variant: ProgramVariant,
    pub primary: PrimaryTexture,
    pub mvp: Mat4,
    pub skew: [f32; 2],
    pub viewport: Viewport,
}

#[derive(Debug)]
pub struct RenderState {
    image_size: (u32, u32),
    surface_size: (u32, u32),
    viewport: Viewport,
    projection: Mat4,
    view: Mat4,
    controls: Arc<Controls>,
}

impl RenderState {
    pub fn new(image_size: (u32, u32), controls: Arc<Controls>) -> Self {
        Self {
            image_size,
            surface_size: (0, 0),
            viewport: Viewport::full((0, 0)),
            projection: quad_projection(),
            view: uniforms::IDENTITY,
            controls,
        }
    }

    /// Refits the viewport after the surface changed size.
    pub fn resized(&mut self, width: u32, height: u32) -> Viewport {
        self.surface_size = (width, height);
        self.viewport = fit_viewport(self.image_size, self.surface_size);
        self.projection = quad_projection();
        self.view = uniforms::IDENTITY;
        tracing::debug!(
            surface_width = width,
            surface_height = height,
            viewport = ?self.viewport,
            "fitted photo viewport"
        );
        self.viewport
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_size
    }

    pub fn controls(&self) -> &Arc<Controls> {
        &self.controls
    }

    pub fn mvp(&self) -> Mat4 {
        uniforms::multiply(&self.projection, &self.view)
    }

    pub fn frame(&self) -> FrameParams {
        let variant = if self.controls.blur() {
            ProgramVariant::Blur
        } else {
            ProgramVariant::Plain
        };
        let primary = if self.controls.show_depth() {
            PrimaryTexture::Depth
        } else {
            PrimaryTexture::Colour
        };
        FrameParams {
            variant,
            primary,
            mvp: self.mvp(),
            skew: self.controls.skew(),
            viewport: self.viewport,
        }
    }
}

/// Extra clip-space margin around the unit quad.
const QUAD_PADDING: f32 = 0.0;

/// The viewport already carries the aspect fit, so the projection only has to
/// span the quad.
fn quad_projection() -> Mat4 {
    let extent = 1.0 + QUAD_PADDING;
    uniforms::orthographic(-extent, extent, -extent, extent, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_reflects_toggles_and_skew() {
        let controls = Arc::new(Controls::default());
        let mut state = RenderState::new((1000, 2000), Arc::clone(&controls));
        state.resized(500, 500);

        let frame = state.frame();
        assert_eq!(frame.variant, ProgramVariant::Plain);
        assert_eq!(frame.primary, PrimaryTexture::Colour);
        assert_eq!(frame.viewport, Viewport { x: 125, y: 0, width: 250, height: 500 });

        controls.toggle_blur();
        controls.toggle_show_depth();
        controls.set_skew(0.25, -0.5);
        let frame = state.frame();
        assert_eq!(frame.variant, ProgramVariant::Blur);
        assert_eq!(frame.primary, PrimaryTexture::Depth);
        assert_eq!(frame.skew, [0.25, -0.5]);
    }

    #[test]
    fn mvp_is_projection_times_identity_view() {
        let state = RenderState::new((10, 10), Arc::new(Controls::default()));
        assert_eq!(state.mvp(), uniforms::orthographic(-1.0, 1.0, -1.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn resize_refits_viewport() {
        let mut state = RenderState::new((400, 300), Arc::new(Controls::default()));
        assert_eq!(state.resized(800, 600), Viewport { x: 200, y: 150, width: 400, height: 300 });
        assert_eq!(state.resized(200, 600).width, 200);
        assert_eq!(state.surface_size(), (200, 600));
    }
}
