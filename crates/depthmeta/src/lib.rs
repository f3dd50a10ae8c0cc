//! Extracts depth-photo metadata from image files.
//!
//! A depth photo is an ordinary JPEG whose embedded metadata packet carries
//! lens-focus parameters, a description of a companion depth map, and both the
//! colour image and the depth map as base64 payloads. Large packets are split
//! across several file segments; [`extended`] stitches them back together
//! before [`attributes`] indexes the recognized keys and [`photo`] turns them
//! into a typed [`DepthPhoto`].
//!
//! ```text
//!   raw file bytes ─▶ strip segment headers ─▶ AttributeIndex ─▶ DepthPhoto
//! ```
//!
//! Parsing is pure; diagnostics go through `tracing` and need no subscriber.
pub mod attributes;
pub mod extended;
mod photo;

pub use attributes::AttributeIndex;
pub use extended::strip_extended_headers;
pub use photo::{read_source, DepthPhoto, MetadataError};

/// Convenience wrapper around [`DepthPhoto::parse`].
pub fn parse(raw: &[u8]) -> Result<DepthPhoto, MetadataError> {
    DepthPhoto::parse(raw)
}
