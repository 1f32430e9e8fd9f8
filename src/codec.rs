/// Cube payload compression.
///
/// Cube payloads are stored as opaque compressed blobs.  The codec is
/// chosen per process from configuration and plugged into each backend.
use crate::error::BackendError;
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Pass payloads through unchanged.
    None,
    /// zlib-wrapped deflate.
    Zlib,
}

pub trait CubeCodec: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, BackendError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, BackendError>;
}

#[derive(Debug, Default)]
pub struct RawCodec;

impl CubeCodec for RawCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        Ok(data.to_vec())
    }
}

#[derive(Debug, Default)]
pub struct ZlibCodec;

impl CubeCodec for ZlibCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        let mut encoder = ZlibEncoder::new(data, Compression::default());
        let mut compressed = Vec::new();
        encoder
            .read_to_end(&mut compressed)
            .map_err(|e| BackendError::Codec(e.to_string()))?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, BackendError> {
        let mut decoder = ZlibDecoder::new(data);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| BackendError::Codec(e.to_string()))?;
        Ok(decompressed)
    }
}

/// Get a codec for the configured kind.
pub fn codec_for(kind: CodecKind) -> Box<dyn CubeCodec> {
    match kind {
        CodecKind::None => Box::new(RawCodec),
        CodecKind::Zlib => Box::new(ZlibCodec),
    }
}
