//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three capabilities the engine
//! needs from a platform codec: read a header, decode at a subsampling
//! factor, and encode a raster at a quality for a codec.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, everything
//! statically linked into the binary.

use super::format::Codec;
use super::params::{Dimensions, Quality};
use super::raster::RasterBuffer;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("source unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("unrecognized image header")]
    UnrecognizedFormat,
    #[error("no decoder for {0}")]
    Unsupported(String),
    #[error("corrupt or truncated image: {0}")]
    Corrupt(String),
    #[error("image {width}x{height} exceeds the decode memory ceiling of {limit} bytes")]
    TooLarge { width: u32, height: u32, limit: u64 },
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("no encoder available for {0}")]
    Unavailable(Codec),
    #[error("{codec} encoder rejected input: {reason}")]
    Rejected { codec: Codec, reason: String },
}

/// Header-level facts about a source, read without a full decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub dimensions: Dimensions,
    /// Container type detected from the header, when the backend knows it.
    pub container: Option<&'static str>,
}

/// One encode attempt's output.
///
/// The bytes are always a real, complete encoding; sizes are never
/// estimated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    pub bytes: Vec<u8>,
    pub codec: Codec,
}

impl EncodedArtifact {
    pub fn new(bytes: Vec<u8>, codec: Codec) -> Self {
        Self { bytes, codec }
    }

    pub fn byte_length(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Trait for image codec backends.
///
/// Implementations must be `Sync`: batch conversion shares one backend
/// across the worker pool.
pub trait ImageBackend: Sync {
    /// Read dimensions and container type from the header only.
    fn probe(&self, bytes: &[u8]) -> Result<SourceInfo, DecodeError>;

    /// Decode to a raster at `1 / sample_size` resolution on each axis.
    fn decode(&self, bytes: &[u8], sample_size: u32) -> Result<RasterBuffer, DecodeError>;

    /// Encode a raster. `quality` is ignored by lossless codecs.
    fn encode(
        &self,
        raster: &RasterBuffer,
        codec: Codec,
        quality: Quality,
    ) -> Result<EncodedArtifact, EncodeError>;

    /// Whether `encode` can produce `codec` at all. Callers that pick file
    /// names ahead of time use this to name the fallback output correctly.
    fn can_encode(&self, _codec: Codec) -> bool {
        true
    }
}
