//! Structured view of a depth photo recovered from its embedded metadata.
//!
//! Types:
//!
//! - `DepthPhoto` holds the focus parameters, depth-map description, and the
//!   two embedded image payloads. Numeric fields use NaN for "absent".
//! - `MetadataError` classifies the fatal failures: unreadable source files,
//!   non-numeric text in a numeric attribute, and malformed base64 payloads.
//!
//! Functions:
//!
//! - `DepthPhoto::parse` strips extended-packet headers, indexes the recognized
//!   attributes in one pass, and converts them into typed fields.
//! - `read_source` loads a whole file for parsing.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use thiserror::Error;
use tracing::{debug, info};

use crate::attributes::{self, AttributeIndex, RECOGNIZED_KEYS};
use crate::extended::strip_extended_headers;

/// Standard alphabet, padding optional, as produced by camera apps that wrap
/// payloads across lines.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read depth photo at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("attribute {key} is not a number: {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("attribute {key} is not valid base64")]
    InvalidBase64 {
        key: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}

#[derive(Debug, Clone)]
pub struct DepthPhoto {
    pub blur_at_infinity: f64,
    pub focal_distance: f64,
    pub focal_point_x: f64,
    pub focal_point_y: f64,

    pub depth_format: Option<String>,
    pub depth_mime: Option<String>,
    pub depth_near: f64,
    pub depth_far: f64,
    pub depth_image: Option<Vec<u8>>,

    pub colour_mime: Option<String>,
    pub colour_image: Option<Vec<u8>>,
}

impl Default for DepthPhoto {
    fn default() -> Self {
        Self {
            blur_at_infinity: f64::NAN,
            focal_distance: f64::NAN,
            focal_point_x: f64::NAN,
            focal_point_y: f64::NAN,
            depth_format: None,
            depth_mime: None,
            depth_near: f64::NAN,
            depth_far: f64::NAN,
            depth_image: None,
            colour_mime: None,
            colour_image: None,
        }
    }
}

impl DepthPhoto {
    /// Extracts a depth photo from the full byte content of an image file.
    ///
    /// A file without a `GImage:Mime` attribute carries no depth metadata; that
    /// yields an empty (invalid) record rather than an error.
    pub fn parse(raw: &[u8]) -> Result<Self, MetadataError> {
        debug!(bytes = raw.len(), "parsing depth photo metadata");

        let stripped;
        let mut index = AttributeIndex::scan(raw, &RECOGNIZED_KEYS);
        if let Some(identifier) = index.raw(attributes::EXTENDED_MARKER) {
            debug!(identifier = %attributes::latin1(identifier), "extended metadata marker found");
            stripped = strip_extended_headers(raw, identifier);
            debug!(
                before = raw.len(),
                after = stripped.len(),
                "removed extended metadata segment headers"
            );
            index = AttributeIndex::scan(&stripped, &RECOGNIZED_KEYS);
        }

        let mut photo = DepthPhoto {
            colour_mime: index.string(attributes::COLOUR_MIME),
            ..DepthPhoto::default()
        };
        if photo.colour_mime.is_none() {
            info!("no {} attribute; file carries no depth metadata", attributes::COLOUR_MIME);
            return Ok(photo);
        }

        photo.blur_at_infinity = number(&index, attributes::BLUR_AT_INFINITY)?;
        photo.focal_distance = number(&index, attributes::FOCAL_DISTANCE)?;
        photo.focal_point_x = number(&index, attributes::FOCAL_POINT_X)?;
        photo.focal_point_y = number(&index, attributes::FOCAL_POINT_Y)?;

        photo.depth_format = index.string(attributes::DEPTH_FORMAT);
        photo.depth_mime = index.string(attributes::DEPTH_MIME);
        photo.depth_near = number(&index, attributes::DEPTH_NEAR)?;
        photo.depth_far = number(&index, attributes::DEPTH_FAR)?;

        photo.colour_image = binary(&index, attributes::COLOUR_DATA)?;
        photo.depth_image = binary(&index, attributes::DEPTH_DATA)?;

        debug!(
            colour_bytes = photo.colour_image.as_ref().map_or(0, Vec::len),
            depth_bytes = photo.depth_image.as_ref().map_or(0, Vec::len),
            valid = photo.is_valid(),
            "parsed depth photo metadata"
        );
        Ok(photo)
    }

    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the fields that keep this record from being renderable.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let numbers = [
            (attributes::BLUR_AT_INFINITY, self.blur_at_infinity),
            (attributes::FOCAL_DISTANCE, self.focal_distance),
            (attributes::FOCAL_POINT_X, self.focal_point_x),
            (attributes::FOCAL_POINT_Y, self.focal_point_y),
            (attributes::DEPTH_NEAR, self.depth_near),
            (attributes::DEPTH_FAR, self.depth_far),
        ];
        let strings = [
            (attributes::DEPTH_FORMAT, &self.depth_format),
            (attributes::DEPTH_MIME, &self.depth_mime),
            (attributes::COLOUR_MIME, &self.colour_mime),
        ];
        let payloads = [
            (attributes::DEPTH_DATA, &self.depth_image),
            (attributes::COLOUR_DATA, &self.colour_image),
        ];

        let mut missing = Vec::new();
        missing.extend(
            numbers
                .iter()
                .filter(|(_, value)| !value.is_finite())
                .map(|(key, _)| *key),
        );
        missing.extend(
            strings
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(key, _)| *key),
        );
        missing.extend(
            payloads
                .iter()
                .filter(|(_, payload)| match payload {
                    Some(bytes) => bytes.is_empty(),
                    None => true,
                })
                .map(|(key, _)| *key),
        );
        missing
    }
}

fn number(index: &AttributeIndex<'_>, key: &'static str) -> Result<f64, MetadataError> {
    let Some(value) = index.string(key) else {
        return Ok(f64::NAN);
    };
    // `inf` and `NaN` parse as f64 but are not usable lens or depth values.
    match value.trim_matches(|c: char| c <= ' ').parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(number),
        _ => Err(MetadataError::InvalidNumber { key, value }),
    }
}

fn binary(index: &AttributeIndex<'_>, key: &'static str) -> Result<Option<Vec<u8>>, MetadataError> {
    let Some(value) = index.raw(key) else {
        return Ok(None);
    };
    let compact: Vec<u8> = value
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    PAYLOAD_ENGINE
        .decode(compact)
        .map(Some)
        .map_err(|source| MetadataError::InvalidBase64 { key, source })
}

/// Reads the whole file at `path` so it can be handed to [`DepthPhoto::parse`].
pub fn read_source(path: impl AsRef<Path>) -> Result<Vec<u8>, MetadataError> {
    let path = path.as_ref();
    let started = Instant::now();
    let bytes = fs::read(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        bytes = bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "loaded depth photo source"
    );
    Ok(bytes)
}
