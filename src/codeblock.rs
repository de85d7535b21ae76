//! Script codeblock encoding
//!
//! Inline script content travels as benchmark Value text and from there
//! through an environment-variable transport into the check engine, so it
//! must be XML-safe and line-length bounded: UTF-8 bytes, optionally
//! zlib-compressed, base64-encoded, hard-wrapped at a fixed column width.
//!
//! Shell payloads are decoded by tooling without a zlib stage and are
//! therefore only base64-encoded; python payloads are compressed first.

use std::io::Write;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Hard-wrap column for encoded payload lines
pub const WRAP_COLUMNS: usize = 120;

/// Encode a payload with zlib compression
pub fn encode_compressed(code: &str) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(code.as_bytes())
        .and_then(|_| encoder.finish())
        .map(|compressed| wrap(&BASE64.encode(compressed)))
        .map_err(|e| Error::Encoding {
            message: format!("zlib compression failed: {}", e),
        })
}

/// Encode a payload without compression
pub fn encode_plain(code: &str) -> String {
    wrap(&BASE64.encode(code.as_bytes()))
}

fn wrap(encoded: &str) -> String {
    let mut lines = Vec::with_capacity(encoded.len() / WRAP_COLUMNS + 1);
    let bytes = encoded.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        let end = (start + WRAP_COLUMNS).min(bytes.len());
        // base64 text is ASCII, byte slicing cannot split a character
        lines.push(&encoded[start..end]);
        start = end;
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_plain_roundtrip() {
        let code = "#!/bin/bash\nexit 0\n";
        let encoded = encode_plain(code);
        let decoded = BASE64.decode(encoded.replace('\n', "")).unwrap();
        assert_eq!(decoded, code.as_bytes());
    }

    #[test]
    fn test_compressed_roundtrip() {
        let code = "import sys\nsys.exit(0)\n";
        let encoded = encode_compressed(code).unwrap();
        let compressed = BASE64.decode(encoded.replace('\n', "")).unwrap();
        let mut decoder = flate2::read::ZlibDecoder::new(compressed.as_slice());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, code);
    }

    #[test]
    fn test_wrap_column_width() {
        let code = "x".repeat(4096);
        let encoded = encode_plain(&code);
        assert!(encoded.lines().count() > 1);
        for line in encoded.lines() {
            assert!(line.len() <= WRAP_COLUMNS);
        }
        // every full line is exactly the wrap width
        let mut lines = encoded.lines().peekable();
        while let Some(line) = lines.next() {
            if lines.peek().is_some() {
                assert_eq!(line.len(), WRAP_COLUMNS);
            }
        }
    }

    #[test]
    fn test_short_payload_is_single_line() {
        let encoded = encode_plain("hi");
        assert_eq!(encoded.lines().count(), 1);
    }
}
