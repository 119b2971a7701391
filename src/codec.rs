//! Build-string codec.
//!
//! A build string is url-safe base64 wrapping a zlib stream of UTF-8 XML.
//! Both directions are pure; `decode(encode(x)) == x` always holds, but
//! `encode` makes no promise of byte-identity with other compressors.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::error::CodecError;

/// Decode a build string into the underlying XML text.
pub fn decode(build_string: &str) -> Result<String, CodecError> {
    let compressed = URL_SAFE.decode(build_string.trim())?;
    let mut decoder = ZlibDecoder::new(compressed.as_slice());
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw).map_err(CodecError::Inflate)?;
    Ok(String::from_utf8(raw)?)
}

/// Encode XML text into a shareable build string.
pub fn encode(xml: &str) -> Result<String, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(xml.as_bytes())
        .map_err(CodecError::Deflate)?;
    let compressed = encoder.finish().map_err(CodecError::Deflate)?;
    Ok(URL_SAFE.encode(compressed))
}
