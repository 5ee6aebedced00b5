//! Output codecs and "keep original" format resolution.
//!
//! Resolution runs once per request, before any encode, and never decodes
//! the source: it only looks at the declared MIME type.
//!
//! | Declared type | Resolved codec |
//! |---|---|
//! | `image/png` | PNG |
//! | `image/webp` | WebP |
//! | `image/bmp` | BMP |
//! | `image/heic`, `image/heif` | HEIF |
//! | anything else, or unknown | JPEG |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A concrete output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Heif,
    Avif,
}

impl Codec {
    /// The lossy codec every failed encode falls back to.
    pub const DEFAULT: Codec = Codec::Jpeg;

    /// Whether the quality parameter has no effect on output size.
    ///
    /// WebP is listed here because the pure-Rust encoder only writes
    /// lossless WebP.
    pub fn is_lossless(self) -> bool {
        matches!(self, Codec::Png | Codec::WebP | Codec::Bmp)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Codec::Jpeg => "jpg",
            Codec::Png => "png",
            Codec::WebP => "webp",
            Codec::Bmp => "bmp",
            Codec::Heif => "heic",
            Codec::Avif => "avif",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Codec::Jpeg => "image/jpeg",
            Codec::Png => "image/png",
            Codec::WebP => "image/webp",
            Codec::Bmp => "image/bmp",
            Codec::Heif => "image/heif",
            Codec::Avif => "image/avif",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Jpeg => "JPEG",
            Codec::Png => "PNG",
            Codec::WebP => "WEBP",
            Codec::Bmp => "BMP",
            Codec::Heif => "HEIF",
            Codec::Avif => "AVIF",
        };
        f.write_str(name)
    }
}

/// What the caller asked for: a concrete codec or "whatever the source is".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    #[default]
    Original,
    Jpeg,
    Png,
    WebP,
    Bmp,
    Heif,
    Avif,
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "original" | "keep" => Ok(TargetFormat::Original),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            "png" => Ok(TargetFormat::Png),
            "webp" => Ok(TargetFormat::WebP),
            "bmp" => Ok(TargetFormat::Bmp),
            "heif" | "heic" => Ok(TargetFormat::Heif),
            "avif" => Ok(TargetFormat::Avif),
            other => Err(format!(
                "unknown format '{other}' (expected original, jpeg, png, webp, bmp, heif or avif)"
            )),
        }
    }
}

impl From<Codec> for TargetFormat {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Jpeg => TargetFormat::Jpeg,
            Codec::Png => TargetFormat::Png,
            Codec::WebP => TargetFormat::WebP,
            Codec::Bmp => TargetFormat::Bmp,
            Codec::Heif => TargetFormat::Heif,
            Codec::Avif => TargetFormat::Avif,
        }
    }
}

/// Resolve the requested format to the codec that will actually be encoded.
pub fn resolve_format(target: TargetFormat, declared_mime: Option<&str>) -> Codec {
    match target {
        TargetFormat::Original => codec_for_mime(declared_mime),
        TargetFormat::Jpeg => Codec::Jpeg,
        TargetFormat::Png => Codec::Png,
        TargetFormat::WebP => Codec::WebP,
        TargetFormat::Bmp => Codec::Bmp,
        TargetFormat::Heif => Codec::Heif,
        TargetFormat::Avif => Codec::Avif,
    }
}

/// Map a declared MIME type onto an output codec, defaulting to JPEG.
pub fn codec_for_mime(mime: Option<&str>) -> Codec {
    let Some(mime) = mime else {
        return Codec::DEFAULT;
    };
    let essence = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => Codec::Png,
        "image/webp" => Codec::WebP,
        "image/bmp" | "image/x-ms-bmp" => Codec::Bmp,
        "image/heic" | "image/heif" | "image/heic-sequence" | "image/heif-sequence" => {
            Codec::Heif
        }
        _ => Codec::DEFAULT,
    }
}

/// Sniff the container type from header bytes only.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

/// Guess a MIME type from a file extension.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime)
}
