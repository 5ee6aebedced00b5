//! Request and result types shared by the conversion and batch stages.
//!
//! A [`ConversionRequest`] is built once by the caller and never mutated by
//! the engine. A successful conversion produces a [`ConversionOutput`]; the
//! history tuple for it is derived in [`crate::history`].

use crate::imaging::format::{mime_from_extension, sniff_mime};
use crate::imaging::{Codec, ColorAdjustmentSpec, Dimensions, Quality, ResizeSpec, TargetFormat};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Where the source bytes come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// An opaque readable image source plus its declared MIME type, if known.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSource {
    pub data: SourceData,
    /// Explicit declared type. When absent it is sniffed from the header,
    /// then guessed from the file extension.
    pub mime: Option<String>,
}

impl ImageSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            data: SourceData::Path(path.into()),
            mime: None,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: SourceData::Bytes(bytes),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.data {
            SourceData::Path(p) => Some(p),
            SourceData::Bytes(_) => None,
        }
    }

    /// Human-readable name used in logs and CLI output.
    pub fn label(&self) -> String {
        match &self.data {
            SourceData::Path(p) => p.display().to_string(),
            SourceData::Bytes(b) => format!("<{} bytes in memory>", b.len()),
        }
    }

    pub fn read(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match &self.data {
            SourceData::Path(p) => std::fs::read(p).map(Cow::Owned),
            SourceData::Bytes(b) => Ok(Cow::Borrowed(b)),
        }
    }

    /// The declared MIME type: explicit, else sniffed from `header`, else
    /// guessed from the extension. Never decodes.
    pub fn declared_mime(&self, header: &[u8]) -> Option<String> {
        if let Some(mime) = &self.mime {
            return Some(mime.clone());
        }
        sniff_mime(header)
            .or_else(|| self.path().and_then(mime_from_extension))
            .map(str::to_string)
    }
}

/// One conversion, fully specified up front.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub source: ImageSource,
    /// Written verbatim once the conversion succeeds. `None` keeps the bytes
    /// in memory only.
    pub destination: Option<PathBuf>,
    pub target_format: TargetFormat,
    pub quality: Quality,
    pub resize: ResizeSpec,
    /// Maximum output size in bytes. `None` skips the target-size search.
    pub target_byte_budget: Option<u64>,
    pub keep_metadata: bool,
    /// Clockwise rotation in degrees; 0 leaves the raster alone.
    pub rotation_degrees: f64,
    pub adjustments: Option<ColorAdjustmentSpec>,
}

impl ConversionRequest {
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            destination: None,
            target_format: TargetFormat::Original,
            quality: Quality::default(),
            resize: ResizeSpec::default(),
            target_byte_budget: None,
            keep_metadata: false,
            rotation_degrees: 0.0,
            adjustments: None,
        }
    }
}

/// A finished conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    pub codec: Codec,
    pub dimensions: Dimensions,
    /// Quality of the final encode (ignored by lossless codecs).
    pub quality: Quality,
    /// `None` when no budget was requested.
    pub budget_met: Option<bool>,
    /// Set when the requested codec failed and JPEG was used instead.
    pub fell_back_from: Option<Codec>,
    pub metadata_copied: bool,
    pub encode_attempts: u32,
    pub destination: Option<PathBuf>,
}

impl ConversionOutput {
    pub fn byte_length(&self) -> u64 {
        self.bytes.len() as u64
    }
}
