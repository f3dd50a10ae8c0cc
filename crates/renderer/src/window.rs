use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use tracing::{error, info, warn};

use crate::gpu::{draw_empty_frame, DepthPipeline, GpuContext, RenderError};
use crate::input::{Controls, SkewMapper};
use crate::sensor::spawn_orientation_feed;
use crate::surface::SurfaceEvents;
use crate::types::{PhotoTextures, RendererConfig, ShaderSources};

/// Loads and decodes a photo dropped onto the window.
pub type PhotoLoader = Box<dyn FnMut(&Path) -> Result<PhotoTextures>>;

/// Interactive window that hosts a [`DepthPipeline`].
///
/// The host owns the window, the GPU context, and the event loop. It feeds
/// pointer, touch, and keyboard input into the shared controls and calls the
/// pipeline's [`SurfaceEvents`] hooks. Keys: `B` blur, `D` depth map,
/// `G` orientation tracking, `R` reset skew, `Esc` quit. Dropping a file on
/// the window replaces the photo.
pub struct Viewer {
    config: RendererConfig,
    loader: PhotoLoader,
}

impl Viewer {
    pub fn new(config: RendererConfig, loader: PhotoLoader) -> Self {
        Self { config, loader }
    }

    /// Opens the window and blocks until it closes.
    ///
    /// Without an initial photo the window shows an empty background until a
    /// valid file is dropped on it.
    pub fn run(self, initial: Option<PhotoTextures>) -> Result<()> {
        let Viewer { config, loader } = self;

        let event_loop = EventLoop::new().context("failed to initialize event loop")?;
        let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
        let window = WindowBuilder::new()
            .with_title(window_title(&config.title, config.photo_path.as_deref()))
            .with_inner_size(window_size)
            .build(&event_loop)
            .context("failed to create viewer window")?;
        let window = Arc::new(window);

        let gpu = GpuContext::new(
            window.as_ref(),
            window.inner_size(),
            config.gpu_power,
            config.vsync,
        )?;

        let controls = Arc::new(Controls::new(config.start_blurred, config.start_showing_depth));
        let mapper = SkewMapper::new(Arc::clone(&controls), config.orientation_feed.is_some());
        if let Some(feed) = config.orientation_feed.clone() {
            // Detached: the thread ends with its input or with the process.
            let _feed = spawn_orientation_feed(feed, mapper.clone())?;
        }

        let mut state = ViewerState {
            pipeline: None,
            gpu,
            window,
            mapper,
            sources: config.shader_sources.clone(),
            title: config.title.clone(),
            loader,
            pointer: PointerState::default(),
            failure: None,
        };

        match initial {
            Some(photo) => state.install(photo, config.photo_path.as_deref())?,
            None => warn!(
                "no photo to show; drop a depth photo onto the window or press Escape to quit"
            ),
        }
        state.window.request_redraw();

        event_loop
            .run(|event, elwt| {
                elwt.set_control_flow(ControlFlow::Wait);

                match event {
                    Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                        match event {
                            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                                elwt.exit();
                            }
                            WindowEvent::KeyboardInput { event, .. } => {
                                if state.handle_key(&event) == KeyOutcome::Quit {
                                    elwt.exit();
                                }
                            }
                            WindowEvent::CursorMoved { position, .. } => {
                                state.pointer_moved(position);
                            }
                            WindowEvent::MouseInput {
                                state: button_state,
                                button: MouseButton::Left,
                                ..
                            } => {
                                state.pointer_button(button_state);
                            }
                            WindowEvent::Touch(touch) => {
                                if matches!(touch.phase, TouchPhase::Started | TouchPhase::Moved) {
                                    state.apply_touch(touch.location);
                                }
                            }
                            WindowEvent::DroppedFile(path) => {
                                if let Err(err) = state.replace_photo(&path) {
                                    error!(error = %err, "renderer failed; closing viewer");
                                    state.failure = Some(err);
                                    elwt.exit();
                                }
                            }
                            WindowEvent::Resized(new_size) => {
                                if let Err(err) = state.resize(new_size) {
                                    error!(error = %err, "surface resize failed; closing viewer");
                                    state.failure = Some(err.into());
                                    elwt.exit();
                                }
                            }
                            WindowEvent::ScaleFactorChanged {
                                mut inner_size_writer,
                                ..
                            } => {
                                let _ = inner_size_writer.request_inner_size(state.gpu.size);
                            }
                            WindowEvent::RedrawRequested => match state.render_frame() {
                                Ok(()) => {}
                                Err(FrameError::Surface(
                                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                                )) => {
                                    let size = state.gpu.size;
                                    if let Err(err) = state.resize(size) {
                                        error!(
                                            error = %err,
                                            "surface reconfigure failed; closing viewer"
                                        );
                                        state.failure = Some(err.into());
                                        elwt.exit();
                                    }
                                }
                                Err(FrameError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                                    error!("surface out of memory; exiting");
                                    state.failure = Some(anyhow!("surface out of memory"));
                                    elwt.exit();
                                }
                                Err(FrameError::Surface(wgpu::SurfaceError::Timeout)) => {
                                    warn!("surface timeout; retrying next frame");
                                }
                                Err(FrameError::Surface(other)) => {
                                    warn!(error = ?other, "surface error; retrying next frame");
                                }
                                Err(FrameError::Render(err)) => {
                                    error!(error = %err, "frame failed; closing viewer");
                                    state.failure = Some(err.into());
                                    elwt.exit();
                                }
                            },
                            _ => {}
                        }
                    }
                    Event::AboutToWait => {
                        state.window.request_redraw();
                    }
                    _ => {}
                }
            })
            .map_err(|err| anyhow!("event loop error: {err}"))?;

        match state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Quit,
}

enum FrameError {
    Surface(wgpu::SurfaceError),
    Render(RenderError),
}

#[derive(Debug, Default)]
struct PointerState {
    position: PhysicalPosition<f64>,
    pressed: bool,
}

/// Fields drop in order; the surface must go before the window it draws to.
struct ViewerState {
    pipeline: Option<DepthPipeline>,
    gpu: GpuContext,
    window: Arc<Window>,
    mapper: SkewMapper,
    sources: ShaderSources,
    title: String,
    loader: PhotoLoader,
    pointer: PointerState,
    failure: Option<anyhow::Error>,
}

impl ViewerState {
    /// Builds a pipeline for `photo` and swaps it in once it is ready.
    fn install(&mut self, photo: PhotoTextures, path: Option<&Path>) -> Result<(), RenderError> {
        let mut pipeline =
            DepthPipeline::new(photo, self.sources.clone(), Arc::clone(self.mapper.controls()));
        pipeline.created(&self.gpu.target())?;
        self.pipeline = Some(pipeline);
        self.window.set_title(&window_title(&self.title, path));
        Ok(())
    }

    /// Loads a dropped file. Unreadable photos are reported and skipped;
    /// only shader failures are fatal.
    fn replace_photo(&mut self, path: &Path) -> Result<()> {
        info!(path = %path.display(), "loading dropped photo");
        let photo = match (self.loader)(path) {
            Ok(photo) => photo,
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "dropped file is not a usable depth photo"
                );
                return Ok(());
            }
        };
        match self.install(photo, Some(path)) {
            Ok(()) => Ok(()),
            Err(err @ RenderError::Compile(_)) => Err(err.into()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to show dropped photo");
                Ok(())
            }
        }
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) -> Result<(), RenderError> {
        if new_size.width == 0 || new_size.height == 0 {
            return Ok(());
        }
        self.gpu.resize(new_size)?;
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.resized(new_size.width, new_size.height);
        }
        Ok(())
    }

    fn pointer_moved(&mut self, position: PhysicalPosition<f64>) {
        self.pointer.position = position;
        if self.pointer.pressed {
            self.apply_touch(position);
        }
    }

    fn pointer_button(&mut self, button_state: ElementState) {
        self.pointer.pressed = button_state == ElementState::Pressed;
        if self.pointer.pressed {
            self.apply_touch(self.pointer.position);
        }
    }

    fn apply_touch(&self, position: PhysicalPosition<f64>) {
        let size = self.gpu.size;
        self.mapper.touch(
            position.x as f32,
            position.y as f32,
            size.width as f32,
            size.height as f32,
        );
    }

    fn handle_key(&self, event: &KeyEvent) -> KeyOutcome {
        if event.state != ElementState::Pressed || event.repeat {
            return KeyOutcome::Continue;
        }
        let controls = self.mapper.controls();
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => return KeyOutcome::Quit,
            Key::Character(text) => match text.to_ascii_lowercase().as_str() {
                "b" => {
                    let blur = controls.toggle_blur();
                    info!(blur, "toggled depth-of-field blur");
                }
                "d" => {
                    let show_depth = controls.toggle_show_depth();
                    info!(show_depth, "toggled depth map display");
                }
                "g" => {
                    let tracking = self.mapper.toggle_orientation();
                    info!(tracking, "toggled orientation tracking");
                }
                "r" => {
                    controls.set_skew(0.0, 0.0);
                    info!("reset skew");
                }
                _ => {}
            },
            _ => {}
        }
        KeyOutcome::Continue
    }

    fn render_frame(&mut self) -> Result<(), FrameError> {
        let frame = self
            .gpu
            .surface
            .get_current_texture()
            .map_err(FrameError::Surface)?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let target = self.gpu.target();

        let drawn = match self.pipeline.as_mut() {
            Some(pipeline) => pipeline.draw_frame(&target, &view),
            None => draw_empty_frame(&target, &view),
        };
        drawn.map_err(FrameError::Render)?;

        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}

fn window_title(base: &str, path: Option<&Path>) -> String {
    match path.and_then(Path::file_name) {
        Some(name) => format!("{base} - {}", name.to_string_lossy()),
        None => base.to_string(),
    }
}
