//! Interactive parallax renderer for depth photos.
//!
//! A depth photo pairs a colour image with a depth map. The renderer draws the
//! colour image on a single quad and shifts every texel along a 2D skew vector
//! in proportion to its depth, which gives the picture a parallax "tilt". A
//! second program adds a depth-weighted blur, and the depth map itself can be
//! shown in place of the colour image.
//!
//! ```text
//!   pointer / touch / orientation feed
//!          │ skew, toggles (atomics)
//!          ▼
//!   Controls ──▶ RenderState::frame() ──▶ DepthPipeline::draw_frame() ──▶ surface
//!                      ▲                          ▲
//!                      │ fit_viewport             │ ShaderProgramManager (naga)
//!                 Viewer (winit) ──SurfaceEvents──┘
//! ```
//!
//! [`Viewer`] owns the window and GPU context and drives the event loop;
//! [`DepthPipeline`] implements [`SurfaceEvents`] and holds every GPU object
//! derived from the photo. Shader locations are resolved by reflection in
//! [`compile`], so custom shader sets only need to keep the same names.

pub mod compile;
mod gpu;
pub mod input;
pub mod sensor;
pub mod state;
pub mod surface;
mod types;
pub mod viewport;
mod window;

pub use compile::{CompileError, CompileStage, ProgramLocations, ShaderProgramManager};
pub use gpu::{DepthPipeline, GpuErrorKind, RenderError};
pub use input::{orientation_to_skew, touch_to_skew, Controls, SkewMapper};
pub use sensor::OrientationFeed;
pub use state::{FrameParams, PrimaryTexture, ProgramVariant, RenderState};
pub use surface::{GpuTarget, SurfaceEvents};
pub use types::{GpuPowerPreference, PhotoTextures, RendererConfig, ShaderKey, ShaderSources};
pub use viewport::{fit_viewport, Viewport};
pub use window::{PhotoLoader, Viewer};
