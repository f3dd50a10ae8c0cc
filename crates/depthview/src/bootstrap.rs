use std::path::Path;

use anyhow::{Context, Result};
use depthmeta::DepthPhoto;
use renderer::{OrientationFeed, PhotoTextures, RendererConfig, ShaderSources};

use crate::cli::ViewArgs;

const DEFAULT_SURFACE_SIZE: (u32, u32) = (1280, 720);

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let trimmed = spec.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow::anyhow!("expected WxH format, e.g. 1280x720"))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid height in size specification"))?;

    if width == 0 || height == 0 {
        anyhow::bail!("surface dimensions must be greater than zero");
    }

    Ok((width, height))
}

pub fn renderer_config(args: &ViewArgs) -> Result<RendererConfig> {
    let surface_size = match args.size.as_deref() {
        Some(spec) => parse_surface_size(spec)
            .with_context(|| format!("invalid --size value '{spec}'"))?,
        None => DEFAULT_SURFACE_SIZE,
    };
    let shader_sources = match args.shader_dir.as_deref() {
        Some(dir) => ShaderSources::from_dir(dir)?,
        None => ShaderSources::builtin(),
    };

    Ok(RendererConfig {
        surface_size,
        title: "depthview".to_string(),
        shader_sources,
        gpu_power: args.gpu_power,
        vsync: !args.no_vsync,
        orientation_feed: args.orientation_feed.as_deref().map(OrientationFeed::parse),
        start_blurred: args.blur,
        start_showing_depth: args.show_depth,
        photo_path: args.file.clone(),
    })
}

/// Reads and parses `path`. I/O failures and malformed attributes are errors;
/// a file that simply lacks depth metadata is returned as an invalid record.
pub fn load_photo(path: &Path) -> Result<DepthPhoto> {
    let bytes = depthmeta::read_source(path)?;
    let photo = depthmeta::parse(&bytes)
        .with_context(|| format!("failed to parse depth metadata in {}", path.display()))?;
    tracing::debug!(path = %path.display(), valid = photo.is_valid(), "parsed depth photo");
    Ok(photo)
}

/// Decodes both payloads of a valid record into RGBA rasters.
pub fn decode_textures(photo: &DepthPhoto) -> Result<PhotoTextures> {
    if !photo.is_valid() {
        anyhow::bail!(
            "not a renderable depth photo; missing {}",
            photo.missing_fields().join(", ")
        );
    }
    let colour = decode_payload(photo.colour_image.as_deref(), "colour image")?;
    let depth = decode_payload(photo.depth_image.as_deref(), "depth map")?;
    tracing::debug!(
        colour_width = colour.width(),
        colour_height = colour.height(),
        depth_width = depth.width(),
        depth_height = depth.height(),
        "decoded depth photo payloads"
    );
    Ok(PhotoTextures { colour, depth })
}

/// Loader used for files dropped onto the viewer window.
pub fn load_textures(path: &Path) -> Result<PhotoTextures> {
    let photo = load_photo(path)?;
    decode_textures(&photo).with_context(|| format!("cannot show {}", path.display()))
}

fn decode_payload(payload: Option<&[u8]>, label: &str) -> Result<image::RgbaImage> {
    let bytes = payload.with_context(|| format!("{label} payload is missing"))?;
    let decoded = image::load_from_memory(bytes)
        .with_context(|| format!("failed to decode {label} ({} bytes)", bytes.len()))?;
    Ok(decoded.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn valid_photo(colour: Vec<u8>, depth: Vec<u8>) -> DepthPhoto {
        DepthPhoto {
            blur_at_infinity: 0.01,
            focal_distance: 10.0,
            focal_point_x: 0.5,
            focal_point_y: 0.5,
            depth_format: Some("RangeInverse".into()),
            depth_mime: Some("image/png".into()),
            depth_near: 5.0,
            depth_far: 20.0,
            depth_image: Some(depth),
            colour_mime: Some("image/png".into()),
            colour_image: Some(colour),
        }
    }

    #[test]
    fn parses_surface_sizes() {
        assert_eq!(parse_surface_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_surface_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_surface_size("0x10").is_err());
        assert!(parse_surface_size("wide").is_err());
    }

    #[test]
    fn decodes_both_payloads() {
        let textures = decode_textures(&valid_photo(png(4, 2), png(2, 1))).unwrap();
        assert_eq!(textures.colour.dimensions(), (4, 2));
        assert_eq!(textures.depth.dimensions(), (2, 1));
        assert_eq!(textures.colour.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn invalid_record_names_missing_fields() {
        let err = decode_textures(&DepthPhoto::default()).unwrap_err();
        assert!(err.to_string().contains("GImage:Mime"));
    }

    #[test]
    fn undecodable_payload_is_reported() {
        let err = decode_textures(&valid_photo(b"not an image".to_vec(), png(1, 1))).unwrap_err();
        assert!(format!("{err:#}").contains("colour image"));
    }

    #[test]
    fn config_maps_view_flags() {
        let args = ViewArgs {
            size: Some("800x600".into()),
            orientation_feed: Some("-".into()),
            no_vsync: true,
            show_depth: true,
            ..ViewArgs::default()
        };
        let config = renderer_config(&args).unwrap();
        assert_eq!(config.surface_size, (800, 600));
        assert!(!config.vsync);
        assert!(config.start_showing_depth);
        assert!(!config.start_blurred);
        assert_eq!(config.orientation_feed, Some(OrientationFeed::Stdin));
    }
}
