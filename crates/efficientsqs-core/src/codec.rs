//! Stored payload encoding and bin splitting.
//!
//! With gzip compression enabled a stored payload is base64(gzip(body)), so
//! bin bodies stay plain text for the downstream queue.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::config::Compression;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("gzip: {0}")]
    Gzip(#[from] std::io::Error),
    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Turn a producer body into the payload pushed onto the buffer.
pub fn encode(body: &[u8], compression: Compression) -> Result<Bytes, CodecError> {
    match compression {
        Compression::None => Ok(Bytes::copy_from_slice(body)),
        Compression::Gzip => {
            let mut gz = GzEncoder::new(Vec::new(), flate2::Compression::default());
            gz.write_all(body)?;
            let compressed = gz.finish()?;
            Ok(Bytes::from(STANDARD.encode(compressed)))
        }
    }
}

/// Inverse of [`encode`], for consumers of the downstream queue.
pub fn decode(stored: &[u8], compression: Compression) -> Result<Vec<u8>, CodecError> {
    match compression {
        Compression::None => Ok(stored.to_vec()),
        Compression::Gzip => {
            let compressed = STANDARD.decode(stored)?;
            let mut out = Vec::new();
            GzDecoder::new(compressed.as_slice()).read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// Split a bin body back into the stored payloads it joins.
pub fn split_bin<'a>(body: &'a [u8], separator: &[u8]) -> Vec<&'a [u8]> {
    if body.is_empty() {
        return Vec::new();
    }
    if separator.is_empty() {
        return vec![body];
    }

    let mut parts = Vec::new();
    let mut rest = body;
    while let Some(pos) = find(rest, separator) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + separator.len()..];
    }
    parts.push(rest);
    parts
}

/// Whether `haystack` contains `needle` anywhere.
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && find(haystack, needle).is_some()
}

/// Whether `payload`, followed in a bin by `separator`, would make the
/// separator match early. That needs the payload to end with a proper prefix
/// of the separator that is also a suffix of it, as "a|~" does for "|~|".
pub fn overlaps_separator(payload: &[u8], separator: &[u8]) -> bool {
    let n = separator.len();
    (1..n).any(|k| payload.ends_with(&separator[..k]) && separator[k..] == separator[..n - k])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
