//! Pure Rust image codec backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe | `image::ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP, BMP) | `image` crate (pure Rust decoders) |
//! | Subsample | `image::imageops::thumbnail` after a full decode |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only) |
//! | Encode → BMP | `image::codecs::bmp::BmpEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → HEIF | not available, reported as [`EncodeError::Unavailable`] |
//!
//! ## Memory
//!
//! None of the `image` decoders can scale during decode, so a subsampled
//! decode still materializes the full-resolution raster before `thumbnail`
//! shrinks it. Peak memory is bounded by the decode ceiling, which is checked
//! against the declared full size, not by the sample factor.

use super::backend::{DecodeError, EncodeError, EncodedArtifact, ImageBackend, SourceInfo};
use super::format::{Codec, sniff_mime};
use super::params::{Dimensions, Quality};
use super::raster::RasterBuffer;
use image::codecs::avif::AvifEncoder;
use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::error::ImageError;
use image::{ExtendedColorType, ImageEncoder, ImageReader, Limits};
use std::io::Cursor;

/// Default ceiling on the RGBA bytes a single decode may allocate (512 MiB).
pub const DEFAULT_MAX_DECODED_BYTES: u64 = 512 * 1024 * 1024;

/// AVIF encoder speed: 1 is slowest/best, 10 is fastest.
const AVIF_SPEED: u8 = 6;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    max_decoded_bytes: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self::with_memory_ceiling(DEFAULT_MAX_DECODED_BYTES)
    }

    /// Reject any decode whose RGBA buffer would exceed `max_decoded_bytes`.
    pub fn with_memory_ceiling(max_decoded_bytes: u64) -> Self {
        Self { max_decoded_bytes }
    }

    fn reader<'a>(&self, bytes: &'a [u8]) -> Result<ImageReader<Cursor<&'a [u8]>>, DecodeError> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        if reader.format().is_none() {
            return Err(match sniff_mime(bytes) {
                Some(mime) => DecodeError::Unsupported(mime.to_string()),
                None => DecodeError::UnrecognizedFormat,
            });
        }
        let mut limits = Limits::default();
        limits.max_alloc = Some(self.max_decoded_bytes);
        reader.limits(limits);
        Ok(reader)
    }

    fn check_ceiling(&self, dims: Dimensions) -> Result<(), DecodeError> {
        if dims.rgba_bytes() > self.max_decoded_bytes {
            return Err(DecodeError::TooLarge {
                width: dims.width,
                height: dims.height,
                limit: self.max_decoded_bytes,
            });
        }
        Ok(())
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(err: ImageError) -> DecodeError {
    match err {
        ImageError::IoError(e) => DecodeError::Unreadable(e),
        ImageError::Unsupported(e) => DecodeError::Unsupported(e.to_string()),
        other => DecodeError::Corrupt(other.to_string()),
    }
}

fn encode_error(codec: Codec, err: ImageError) -> EncodeError {
    match err {
        ImageError::Unsupported(_) => EncodeError::Unavailable(codec),
        other => EncodeError::Rejected {
            codec,
            reason: other.to_string(),
        },
    }
}

/// Run the codec's encoder into an in-memory buffer.
fn encode_to_vec(raster: &RasterBuffer, codec: Codec, quality: Quality) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = (raster.width(), raster.height());
    let rgba = raster.pixels().as_raw();
    let q = quality.value() as u8;
    let mut out = Vec::new();

    let result = match codec {
        Codec::Jpeg => {
            let rgb = raster.to_rgb();
            JpegEncoder::new_with_quality(&mut out, q).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        Codec::Png => {
            PngEncoder::new(&mut out).write_image(rgba, width, height, ExtendedColorType::Rgba8)
        }
        Codec::WebP => WebPEncoder::new_lossless(&mut out).write_image(
            rgba,
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        Codec::Bmp => {
            BmpEncoder::new(&mut out).write_image(rgba, width, height, ExtendedColorType::Rgba8)
        }
        Codec::Avif => AvifEncoder::new_with_speed_quality(&mut out, AVIF_SPEED, q).write_image(
            rgba,
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        Codec::Heif => return Err(EncodeError::Unavailable(codec)),
    };

    result.map_err(|e| encode_error(codec, e))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn probe(&self, bytes: &[u8]) -> Result<SourceInfo, DecodeError> {
        let reader = self.reader(bytes)?;
        let container = reader.format().map(|f| f.to_mime_type());
        let (width, height) = reader.into_dimensions().map_err(decode_error)?;
        Ok(SourceInfo {
            dimensions: Dimensions::new(width, height),
            container,
        })
    }

    fn decode(&self, bytes: &[u8], sample_size: u32) -> Result<RasterBuffer, DecodeError> {
        let declared = self.probe(bytes)?.dimensions;
        self.check_ceiling(declared)?;

        let decoded = self.reader(bytes)?.decode().map_err(decode_error)?;
        let factor = sample_size.max(1);
        let pixels = if factor > 1 {
            let rgba = decoded.into_rgba8();
            let target = super::calculations::subsampled_dimensions(
                Dimensions::new(rgba.width(), rgba.height()),
                factor,
            );
            image::imageops::thumbnail(&rgba, target.width, target.height)
        } else {
            decoded.into_rgba8()
        };

        RasterBuffer::new(pixels).ok_or_else(|| DecodeError::Corrupt("decoded an empty image".into()))
    }

    fn encode(
        &self,
        raster: &RasterBuffer,
        codec: Codec,
        quality: Quality,
    ) -> Result<EncodedArtifact, EncodeError> {
        let bytes = encode_to_vec(raster, codec, quality)?;
        Ok(EncodedArtifact::new(bytes, codec))
    }

    fn can_encode(&self, codec: Codec) -> bool {
        codec != Codec::Heif
    }
}
