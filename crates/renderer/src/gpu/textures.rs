use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use super::error::{checked, RenderError};

const DATA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DISPLAY_SRGB_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Which of the two photo images a texture holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PhotoLayer {
    Colour,
    Depth,
}

impl PhotoLayer {
    pub fn label(self) -> &'static str {
        match self {
            PhotoLayer::Colour => "colour image",
            PhotoLayer::Depth => "depth map",
        }
    }

    fn upload_operation(self) -> &'static str {
        match self {
            PhotoLayer::Colour => "upload colour image",
            PhotoLayer::Depth => "upload depth map",
        }
    }
}

pub(crate) struct PhotoTexture {
    pub _texture: wgpu::Texture,
    /// Stored values, unconverted. Shaders read depth through this view.
    pub view: wgpu::TextureView,
    display: Option<wgpu::TextureView>,
}

impl PhotoTexture {
    /// View bound when the texture is drawn to the screen.
    pub fn display_view(&self) -> &wgpu::TextureView {
        self.display.as_ref().unwrap_or(&self.view)
    }
}

/// Format of the display view for a render target, if it differs from the
/// stored data.
///
/// An sRGB target encodes shader output on write, so images shown on it are
/// sampled through an sRGB view that decodes them first. Both the colour image
/// and the depth map then reach the screen with their stored values.
pub(crate) fn display_format(target: wgpu::TextureFormat) -> Option<wgpu::TextureFormat> {
    target.is_srgb().then_some(DISPLAY_SRGB_FORMAT)
}

/// Uploads an RGBA image as a single-mip 2D texture with a display view
/// matching `target`.
pub(crate) fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layer: PhotoLayer,
    image: &RgbaImage,
    target: wgpu::TextureFormat,
) -> Result<PhotoTexture, RenderError> {
    let label = layer.label();
    let (width, height) = image.dimensions();
    let max = device.limits().max_texture_dimension_2d;
    if width == 0 || height == 0 || width > max || height > max {
        return Err(RenderError::InvalidTextureSize {
            label,
            width,
            height,
            max,
        });
    }

    let display_format = display_format(target);
    let view_formats: Vec<wgpu::TextureFormat> = display_format.into_iter().collect();
    let (texture, view, display) = checked(device, layer.upload_operation(), || {
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DATA_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &view_formats,
            },
            TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let display = display_format.map(|format| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("photo display view"),
                format: Some(format),
                ..Default::default()
            })
        });
        (texture, view, display)
    })?;

    tracing::debug!(label, width, height, ?display_format, "uploaded photo texture");
    Ok(PhotoTexture {
        _texture: texture,
        view,
        display,
    })
}

pub(crate) fn photo_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("photo sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::headless_device;

    #[test]
    fn srgb_targets_get_an_srgb_display_view() {
        assert_eq!(
            display_format(wgpu::TextureFormat::Bgra8UnormSrgb),
            Some(wgpu::TextureFormat::Rgba8UnormSrgb)
        );
        assert_eq!(display_format(wgpu::TextureFormat::Rgba8Unorm), None);
    }

    #[test]
    fn upload_rejects_empty_images() {
        let Some((device, queue)) = headless_device() else {
            return;
        };
        let err = upload(
            &device,
            &queue,
            PhotoLayer::Depth,
            &RgbaImage::new(0, 4),
            wgpu::TextureFormat::Rgba8Unorm,
        )
        .err()
        .expect("empty image must be rejected");
        assert!(matches!(
            err,
            RenderError::InvalidTextureSize { label: "depth map", width: 0, height: 4, .. }
        ));
    }

    #[test]
    fn upload_on_srgb_target_keeps_data_view_linear() {
        let Some((device, queue)) = headless_device() else {
            return;
        };
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([128, 128, 128, 255]));
        let texture = upload(
            &device,
            &queue,
            PhotoLayer::Depth,
            &image,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        )
        .expect("upload succeeds");
        assert!(texture.display.is_some());
        assert_eq!(texture._texture.format(), DATA_FORMAT);
    }
}
