use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::compile::{ProgramLocations, ShaderProgram, ShaderProgramManager};
use crate::input::Controls;
use crate::state::{PrimaryTexture, ProgramVariant, RenderState};
use crate::surface::{GpuTarget, SurfaceEvents};
use crate::types::{PhotoTextures, ShaderSources};
use crate::viewport::Viewport;

use super::error::{checked, RenderError};
use super::textures::{self, PhotoLayer, PhotoTexture};
use super::uniforms::UniformBlock;

pub(crate) const CLEAR_COLOUR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 3],
    tex_coord: [f32; 2],
}

/// Full-viewport quad as a triangle strip; texture row 0 is the top edge.
const QUAD: [QuadVertex; 4] = [
    QuadVertex { position: [1.0, 1.0, 0.0], tex_coord: [1.0, 0.0] },
    QuadVertex { position: [-1.0, 1.0, 0.0], tex_coord: [0.0, 0.0] },
    QuadVertex { position: [1.0, -1.0, 0.0], tex_coord: [1.0, 1.0] },
    QuadVertex { position: [-1.0, -1.0, 0.0], tex_coord: [0.0, 1.0] },
];

/// GPU objects for one linked program.
struct ProgramResources {
    pipeline: wgpu::RenderPipeline,
    locations: ProgramLocations,
    block: UniformBlock,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    /// Unit 0 = colour, unit 1 = depth.
    colour_primary: wgpu::BindGroup,
    /// Unit 0 = depth, unit 1 = depth.
    depth_primary: wgpu::BindGroup,
}

struct GpuResources {
    plain: ProgramResources,
    blur: ProgramResources,
    vertex_buffer: wgpu::Buffer,
    _colour: PhotoTexture,
    _depth: PhotoTexture,
    _sampler: wgpu::Sampler,
}

/// Draws one depth photo with the parallax and blur programs.
pub struct DepthPipeline {
    photo: PhotoTextures,
    sources: ShaderSources,
    programs: ShaderProgramManager,
    state: RenderState,
    gpu: Option<GpuResources>,
}

impl DepthPipeline {
    pub fn new(photo: PhotoTextures, sources: ShaderSources, controls: Arc<Controls>) -> Self {
        let state = RenderState::new(photo.colour_size(), controls);
        Self {
            photo,
            sources,
            programs: ShaderProgramManager::new(),
            state,
            gpu: None,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn set_skew(&self, x: f32, y: f32) {
        self.state.controls().set_skew(x, y);
    }

    pub fn toggle_blur(&self) -> bool {
        self.state.controls().toggle_blur()
    }

    pub fn toggle_show_depth(&self) -> bool {
        self.state.controls().toggle_show_depth()
    }
}

impl SurfaceEvents for DepthPipeline {
    fn created(&mut self, target: &GpuTarget<'_>) -> Result<(), RenderError> {
        let programs = self.programs.compile_variants(&self.sources)?;

        let colour = textures::upload(
            target.device,
            target.queue,
            PhotoLayer::Colour,
            &self.photo.colour,
            target.format,
        )?;
        let depth = textures::upload(
            target.device,
            target.queue,
            PhotoLayer::Depth,
            &self.photo.depth,
            target.format,
        )?;

        let resources = checked(target.device, "create depth pipeline", || {
            let sampler = textures::photo_sampler(target.device);
            let vertex_buffer =
                target
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("photo quad"),
                        contents: bytemuck::cast_slice(&QUAD),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
            let plain = build_program(target, &programs.plain, &colour, &depth, &sampler);
            let blur = build_program(target, &programs.blur, &colour, &depth, &sampler);
            GpuResources {
                plain,
                blur,
                vertex_buffer,
                _colour: colour,
                _depth: depth,
                _sampler: sampler,
            }
        })?;

        self.gpu = Some(resources);
        self.state.resized(target.size.0, target.size.1);
        tracing::info!(
            image_width = self.photo.colour.width(),
            image_height = self.photo.colour.height(),
            format = ?target.format,
            "depth pipeline ready"
        );
        Ok(())
    }

    fn resized(&mut self, width: u32, height: u32) {
        self.state.resized(width, height);
    }

    fn draw_frame(
        &mut self,
        target: &GpuTarget<'_>,
        view: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let gpu = self.gpu.as_mut().ok_or(RenderError::NotCreated)?;
        let frame = self.state.frame();
        let program = match frame.variant {
            ProgramVariant::Plain => &mut gpu.plain,
            ProgramVariant::Blur => &mut gpu.blur,
        };
        program.block.set_mvp(&frame.mvp);
        program.block.set_skew(frame.skew);

        let viewport = clamp_viewport(frame.viewport, target.size);
        let textures = match frame.primary {
            PrimaryTexture::Colour => &program.colour_primary,
            PrimaryTexture::Depth => &program.depth_primary,
        };

        checked(target.device, "draw frame", || {
            target
                .queue
                .write_buffer(&program.uniform_buffer, 0, program.block.as_bytes());

            let mut encoder = target
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("depth frame encoder"),
                });
            {
                let mut pass = begin_clear_pass(&mut encoder, view);
                if let Some(viewport) = viewport {
                    pass.set_viewport(
                        viewport.x as f32,
                        viewport.y as f32,
                        viewport.width as f32,
                        viewport.height as f32,
                        0.0,
                        1.0,
                    );
                    pass.set_pipeline(&program.pipeline);
                    pass.set_bind_group(
                        program.locations.uniform_group(),
                        &program.uniform_bind_group,
                        &[],
                    );
                    pass.set_bind_group(program.locations.texture_group(), textures, &[]);
                    pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                    pass.draw(0..QUAD.len() as u32, 0..1);
                }
            }
            target.queue.submit(Some(encoder.finish()));
        })
    }
}

/// Clears `view` without drawing; used while no photo is loaded.
pub(crate) fn draw_empty_frame(
    target: &GpuTarget<'_>,
    view: &wgpu::TextureView,
) -> Result<(), RenderError> {
    checked(target.device, "clear frame", || {
        let mut encoder = target
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("empty frame encoder"),
            });
        drop(begin_clear_pass(&mut encoder, view));
        target.queue.submit(Some(encoder.finish()));
    })
}

fn begin_clear_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("depth photo pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(CLEAR_COLOUR),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

/// Intersects the fitted viewport with the attachment; `None` when empty.
fn clamp_viewport(viewport: Viewport, size: (u32, u32)) -> Option<Viewport> {
    let (max_x, max_y) = (size.0 as i32, size.1 as i32);
    let left = viewport.x.clamp(0, max_x);
    let top = viewport.y.clamp(0, max_y);
    let right = (viewport.x + viewport.width).clamp(0, max_x);
    let bottom = (viewport.y + viewport.height).clamp(0, max_y);
    (right > left && bottom > top).then_some(Viewport {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    })
}

fn build_program(
    target: &GpuTarget<'_>,
    program: &ShaderProgram,
    colour: &PhotoTexture,
    depth: &PhotoTexture,
    sampler: &wgpu::Sampler,
) -> ProgramResources {
    let device = target.device;
    let locations = program.locations;
    let vertex_module = device.create_shader_module(program.vertex_descriptor());
    let fragment_module = device.create_shader_module(program.fragment_descriptor());

    let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("transform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: locations.mvp.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });
    let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("photo texture layout"),
        entries: &texture_layout_entries(&locations),
    });

    let mut group_layouts = [&uniform_layout, &texture_layout];
    if locations.uniform_group() != 0 {
        group_layouts.swap(0, 1);
    }
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("depth pipeline layout"),
        bind_group_layouts: &group_layouts,
        push_constant_ranges: &[],
    });

    let block = UniformBlock::new(&locations);
    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("transform uniforms"),
        size: block.size(),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("transform bind group"),
        layout: &uniform_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: locations.mvp.binding,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });

    let colour_primary = texture_bind_group(
        device,
        &texture_layout,
        &locations,
        [colour.display_view(), &depth.view],
        sampler,
    );
    let depth_primary = texture_bind_group(
        device,
        &texture_layout,
        &locations,
        [depth.display_view(), &depth.view],
        sampler,
    );

    let attributes = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: locations.position,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            shader_location: locations.tex_coord,
        },
    ];

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.label.as_str()),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleStrip,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    ProgramResources {
        pipeline,
        locations,
        block,
        uniform_buffer,
        uniform_bind_group,
        colour_primary,
        depth_primary,
    }
}

fn texture_layout_entries(locations: &ProgramLocations) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(4);
    for unit in [locations.colour, locations.depth] {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit.texture_binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit.sampler_binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

/// `views[0]` goes to texture unit 0 (colour slot), `views[1]` to unit 1.
/// Unit 0 is what reaches the screen; unit 1 is read as raw depth.
fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    locations: &ProgramLocations,
    views: [&wgpu::TextureView; 2],
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(4);
    for (unit, view) in [locations.colour, locations.depth].into_iter().zip(views) {
        entries.push(wgpu::BindGroupEntry {
            binding: unit.texture_binding,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: unit.sampler_binding,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("photo texture bind group"),
        layout,
        entries: &entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless_device;

    fn photo() -> PhotoTextures {
        PhotoTextures {
            colour: image::RgbaImage::from_pixel(100, 200, image::Rgba([200, 120, 40, 255])),
            depth: image::RgbaImage::from_pixel(50, 100, image::Rgba([90, 90, 90, 255])),
        }
    }

    fn offscreen_view(device: &wgpu::Device, format: wgpu::TextureFormat) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("offscreen frame"),
                size: wgpu::Extent3d {
                    width: 500,
                    height: 500,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn draws_every_mode_on(format: wgpu::TextureFormat) {
        let Some((device, queue)) = headless_device() else {
            return;
        };
        let view = offscreen_view(&device, format);
        let target = GpuTarget {
            device: &device,
            queue: &queue,
            format,
            size: (500, 500),
        };
        let mut pipeline =
            DepthPipeline::new(photo(), ShaderSources::builtin(), Arc::new(Controls::default()));

        pipeline.created(&target).expect("pipeline created");
        assert_eq!(
            pipeline.state().viewport(),
            Viewport { x: 200, y: 150, width: 100, height: 200 }
        );

        for (blur, show_depth) in [(false, false), (true, false), (true, true), (false, true)] {
            let controls = pipeline.state().controls();
            if controls.blur() != blur {
                pipeline.toggle_blur();
            }
            if controls.show_depth() != show_depth {
                pipeline.toggle_show_depth();
            }
            pipeline.set_skew(0.3, -0.2);
            let drawn = pipeline.draw_frame(&target, &view);
            assert!(drawn.is_ok(), "blur={blur} show_depth={show_depth}: {drawn:?}");
        }
    }

    #[test]
    fn draws_every_mode_on_linear_target() {
        draws_every_mode_on(wgpu::TextureFormat::Rgba8Unorm);
    }

    #[test]
    fn draws_every_mode_on_srgb_target() {
        draws_every_mode_on(wgpu::TextureFormat::Rgba8UnormSrgb);
    }

    #[test]
    fn draw_before_created_is_an_error() {
        let Some((device, queue)) = headless_device() else {
            return;
        };
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let view = offscreen_view(&device, format);
        let target = GpuTarget {
            device: &device,
            queue: &queue,
            format,
            size: (500, 500),
        };
        let mut pipeline =
            DepthPipeline::new(photo(), ShaderSources::builtin(), Arc::new(Controls::default()));

        assert!(matches!(
            pipeline.draw_frame(&target, &view),
            Err(RenderError::NotCreated)
        ));
    }

    #[test]
    fn quad_covers_clip_space_with_top_row_at_v_zero() {
        for vertex in QUAD {
            let [x, y, z] = vertex.position;
            assert_eq!(z, 0.0);
            assert_eq!(vertex.tex_coord[0], (x + 1.0) / 2.0);
            assert_eq!(vertex.tex_coord[1], (1.0 - y) / 2.0);
        }
    }

    #[test]
    fn viewport_is_clamped_to_attachment() {
        let fitted = Viewport { x: 125, y: 0, width: 250, height: 500 };
        assert_eq!(clamp_viewport(fitted, (500, 500)), Some(fitted));
        assert_eq!(
            clamp_viewport(fitted, (300, 400)),
            Some(Viewport { x: 125, y: 0, width: 175, height: 400 })
        );
        assert_eq!(clamp_viewport(fitted, (100, 100)), None);
    }
}
