//! Removes the segment headers that split an extended metadata packet across
//! several file segments.
//!
//! A packet too large for one segment is continued in further segments, each
//! of which starts with a fixed header:
//!
//! ```text
//!   [4 bytes: segment marker + length]
//!   http://ns.adobe.com/xmp/extension/
//!   [1 byte: separator]
//!   <identifier>
//!   [8 bytes: full length + offset]
//! ```
//!
//! Once every header naming the packet identifier is excised, the continued
//! attribute values (usually the base64 depth payload) are contiguous again.
use std::borrow::Cow;

use crate::attributes::find;

pub const EXTENSION_NAMESPACE: &[u8] = b"http://ns.adobe.com/xmp/extension/";

const SEGMENT_PREFIX_LEN: usize = 4;
const SEPARATOR_LEN: usize = 1;
const SEGMENT_SUFFIX_LEN: usize = 8;

/// Total byte length of one segment header for an identifier of `id_len` bytes.
pub fn header_len(id_len: usize) -> usize {
    SEGMENT_PREFIX_LEN + EXTENSION_NAMESPACE.len() + SEPARATOR_LEN + id_len + SEGMENT_SUFFIX_LEN
}

/// Excises every header referencing `identifier`, left to right and without
/// overlap. Returns the input untouched (borrowed) when nothing matched.
pub fn strip_extended_headers<'a>(text: &'a [u8], identifier: &[u8]) -> Cow<'a, [u8]> {
    let mut stripped: Option<Vec<u8>> = None;
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(offset) = find(&text[search_from..], EXTENSION_NAMESPACE) {
        let namespace_at = search_from + offset;
        search_from = namespace_at + 1;

        if namespace_at < copied_to + SEGMENT_PREFIX_LEN {
            continue;
        }
        let start = namespace_at - SEGMENT_PREFIX_LEN;
        let id_at = namespace_at + EXTENSION_NAMESPACE.len() + SEPARATOR_LEN;
        let end = id_at + identifier.len() + SEGMENT_SUFFIX_LEN;
        if end > text.len() || &text[id_at..id_at + identifier.len()] != identifier {
            continue;
        }

        let buffer = stripped.get_or_insert_with(|| Vec::with_capacity(text.len()));
        buffer.extend_from_slice(&text[copied_to..start]);
        copied_to = end;
        search_from = end;
    }

    match stripped {
        Some(mut buffer) => {
            buffer.extend_from_slice(&text[copied_to..]);
            Cow::Owned(buffer)
        }
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(id: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xE1, 0x0A, 0x0D];
        bytes.extend_from_slice(EXTENSION_NAMESPACE);
        bytes.push(0);
        bytes.extend_from_slice(id);
        bytes.extend_from_slice(&[0, 0, 0x85, 0x0A, 0, 0, 0xFF, 0xFE]);
        bytes
    }

    #[test]
    fn header_length_matches_layout() {
        assert_eq!(header(b"ABC123").len(), header_len(6));
    }

    #[test]
    fn removes_headers_with_arbitrary_length_bytes() {
        let mut text = b"QUJD".to_vec();
        text.extend(header(b"ID"));
        text.extend_from_slice(b"REVG");
        assert_eq!(strip_extended_headers(&text, b"ID").as_ref(), b"QUJDREVG");
    }

    #[test]
    fn leaves_foreign_identifiers_alone() {
        let mut text = b"left".to_vec();
        text.extend(header(b"OTHER"));
        text.extend_from_slice(b"right");
        let stripped = strip_extended_headers(&text, b"MINE");
        assert!(matches!(stripped, Cow::Borrowed(_)));
        assert_eq!(stripped.as_ref(), text.as_slice());
    }

    #[test]
    fn header_at_start_without_prefix_room_is_kept() {
        let mut text = EXTENSION_NAMESPACE.to_vec();
        text.push(0);
        text.extend_from_slice(b"ID12345678");
        assert_eq!(strip_extended_headers(&text, b"ID").as_ref(), text.as_slice());
    }

    #[test]
    fn truncated_header_is_kept() {
        let mut text = b"abcd".to_vec();
        text.extend_from_slice(EXTENSION_NAMESPACE);
        text.push(0);
        text.extend_from_slice(b"ID123");
        assert_eq!(strip_extended_headers(&text, b"ID").as_ref(), text.as_slice());
    }
}
