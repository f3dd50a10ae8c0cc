use std::io::{Cursor, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use depthmeta::DepthPhoto;
use serde::Serialize;

use crate::bootstrap;
use crate::cli::InspectArgs;

/// Exit status for a readable file that is not a renderable depth photo.
pub const NOT_RENDERABLE: u8 = 2;

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub path: String,
    pub valid: bool,
    pub missing_fields: Vec<&'static str>,
    pub focus: FocusReport,
    pub colour: ColourReport,
    pub depth: DepthReport,
}

#[derive(Debug, Serialize)]
pub struct FocusReport {
    pub blur_at_infinity: Option<f64>,
    pub focal_distance: Option<f64>,
    pub focal_point_x: Option<f64>,
    pub focal_point_y: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ColourReport {
    pub mime: Option<String>,
    pub bytes: usize,
    pub dimensions: Option<[u32; 2]>,
}

#[derive(Debug, Serialize)]
pub struct DepthReport {
    pub format: Option<String>,
    pub mime: Option<String>,
    pub near: Option<f64>,
    pub far: Option<f64>,
    pub bytes: usize,
    pub dimensions: Option<[u32; 2]>,
}

impl InspectReport {
    pub fn new(path: &Path, photo: &DepthPhoto) -> Self {
        Self {
            path: path.display().to_string(),
            valid: photo.is_valid(),
            missing_fields: photo.missing_fields(),
            focus: FocusReport {
                blur_at_infinity: finite(photo.blur_at_infinity),
                focal_distance: finite(photo.focal_distance),
                focal_point_x: finite(photo.focal_point_x),
                focal_point_y: finite(photo.focal_point_y),
            },
            colour: ColourReport {
                mime: photo.colour_mime.clone(),
                bytes: photo.colour_image.as_ref().map_or(0, Vec::len),
                dimensions: photo.colour_image.as_deref().and_then(dimensions),
            },
            depth: DepthReport {
                format: photo.depth_format.clone(),
                mime: photo.depth_mime.clone(),
                near: finite(photo.depth_near),
                far: finite(photo.depth_far),
                bytes: photo.depth_image.as_ref().map_or(0, Vec::len),
                dimensions: photo.depth_image.as_deref().and_then(dimensions),
            },
        }
    }
}

pub fn run(args: &InspectArgs) -> Result<ExitCode> {
    let photo = bootstrap::load_photo(&args.file)?;
    let report = InspectReport::new(&args.file, &photo);

    let json = if args.compact {
        serde_json::to_string(&report)
    } else {
        serde_json::to_string_pretty(&report)
    }
    .context("failed to serialise inspect report")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("failed to write inspect report")?;

    if report.valid {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::info!(missing = ?report.missing_fields, "not a renderable depth photo");
        Ok(ExitCode::from(NOT_RENDERABLE))
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Reads only the image header; undecodable payloads report no dimensions.
fn dimensions(bytes: &[u8]) -> Option<[u32; 2]> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok((width, height)) => Some([width, height]),
        Err(err) => {
            tracing::debug!(error = %err, "payload dimensions unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::GrayImage::new(width, height);
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn empty_record_reports_every_field_missing() {
        let report = InspectReport::new(Path::new("plain.jpg"), &DepthPhoto::default());
        assert!(!report.valid);
        assert_eq!(report.missing_fields.len(), 11);
        assert_eq!(report.focus.focal_distance, None);
        assert_eq!(report.colour.bytes, 0);
        assert_eq!(report.depth.dimensions, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["focus"]["blur_at_infinity"], serde_json::Value::Null);
        assert_eq!(json["path"], "plain.jpg");
    }

    #[test]
    fn payload_dimensions_come_from_image_headers() {
        assert_eq!(dimensions(&png(7, 3)), Some([7, 3]));
        assert_eq!(dimensions(b"garbage"), None);
    }

    #[test]
    fn finite_drops_unset_numbers() {
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(0.25), Some(0.25));
    }
}
