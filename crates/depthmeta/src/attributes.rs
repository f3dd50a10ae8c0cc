//! Single-pass index over the `key="value"` attributes embedded in a depth
//! photo's metadata packet.
//!
//! Matching follows the loose textual rules depth-photo writers rely on: the
//! key is compared ASCII case-insensitively, it may be preceded by any byte
//! (namespace prefixes are part of the key, not a boundary), the value is the
//! run of non-quote bytes after `="`, and only the first occurrence of a key
//! counts. The document is walked once for every recognized key instead of
//! being rescanned per attribute.
use std::collections::HashMap;

/// Marker whose value identifies an extended packet split across segments.
pub const EXTENDED_MARKER: &str = "xmpNote:HasExtendedXMP";

pub const COLOUR_MIME: &str = "GImage:Mime";
pub const COLOUR_DATA: &str = "GImage:Data";
pub const BLUR_AT_INFINITY: &str = "GFocus:BlurAtInfinity";
pub const FOCAL_DISTANCE: &str = "GFocus:FocalDistance";
pub const FOCAL_POINT_X: &str = "GFocus:FocalPointX";
pub const FOCAL_POINT_Y: &str = "GFocus:FocalPointY";
pub const DEPTH_FORMAT: &str = "GDepth:Format";
pub const DEPTH_MIME: &str = "GDepth:Mime";
pub const DEPTH_NEAR: &str = "GDepth:Near";
pub const DEPTH_FAR: &str = "GDepth:Far";
pub const DEPTH_DATA: &str = "GDepth:Data";

/// Every attribute the extractor understands, plus the continuation marker.
pub const RECOGNIZED_KEYS: [&str; 12] = [
    EXTENDED_MARKER,
    COLOUR_MIME,
    BLUR_AT_INFINITY,
    FOCAL_DISTANCE,
    FOCAL_POINT_X,
    FOCAL_POINT_Y,
    DEPTH_FORMAT,
    DEPTH_MIME,
    DEPTH_NEAR,
    DEPTH_FAR,
    COLOUR_DATA,
    DEPTH_DATA,
];

const ASSIGNMENT: &[u8] = b"=\"";

/// Raw attribute values borrowed from the scanned document.
#[derive(Debug, Default)]
pub struct AttributeIndex<'a> {
    values: HashMap<&'static str, &'a [u8]>,
}

impl<'a> AttributeIndex<'a> {
    /// Walks `text` once and records the first value of each key in `keys`.
    pub fn scan(text: &'a [u8], keys: &[&'static str]) -> Self {
        let mut values = HashMap::with_capacity(keys.len());
        let mut cursor = 0;

        while let Some(offset) = find(&text[cursor..], ASSIGNMENT) {
            let assignment = cursor + offset;
            let value_start = assignment + ASSIGNMENT.len();
            // Without a closing quote no later assignment can match either.
            let Some(value_len) = text[value_start..].iter().position(|&b| b == b'"') else {
                break;
            };
            let value = &text[value_start..value_start + value_len];

            for &key in keys {
                if values.contains_key(key) {
                    continue;
                }
                if key_precedes(text, assignment, key) {
                    values.insert(key, value);
                }
            }

            if values.len() == keys.len() {
                break;
            }
            cursor = assignment + 1;
        }

        Self { values }
    }

    pub fn raw(&self, key: &str) -> Option<&'a [u8]> {
        self.values.get(key).copied()
    }

    /// Value decoded one byte per character (ISO-8859-1).
    pub fn string(&self, key: &str) -> Option<String> {
        self.raw(key).map(latin1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn key_precedes(text: &[u8], assignment: usize, key: &str) -> bool {
    let key = key.as_bytes();
    assignment >= key.len() && text[assignment - key.len()..assignment].eq_ignore_ascii_case(key)
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub(crate) fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
