//! Single-image conversion pipeline.
//!
//! ```text
//! read → resolve codec → probe → decode (subsampled) → rotate → resize
//!      → color → encode / target-size search → metadata → write
//! ```
//!
//! Stages run strictly in order and each one takes ownership of the raster
//! the previous stage produced. Progress milestones: 0.2 after decode, 0.4
//! after geometry, 0.5 after color, a cosmetic ramp toward 0.9 while
//! encoding, 1.0 when done. Cancellation is checked between stages and on
//! every search iteration; a cancelled request writes nothing.
//!
//! ## Encoder fallback
//!
//! If the resolved codec fails with an [`EncodeError`] and it is not already
//! JPEG, the encode stage is retried exactly once with JPEG. The output
//! records the codec it fell back from.
//!
//! ## Destination
//!
//! The bytes are written to exactly `request.destination`; the engine never
//! renames it, not even after a fallback. Callers that derive file names
//! from the codec should consult [`ImageBackend::can_encode`] up front.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::imaging::calculations::{calculate_sample_size, decode_bound};
use crate::imaging::{
    Codec, DecodeError, Dimensions, EncodeError, EncodedArtifact, ImageBackend, Quality,
    RasterBuffer, ResizeSpec, color, resolve_format, transform,
};
use crate::metadata::{MetadataError, transfer_metadata};
use crate::progress::{Cancelled, Progress};
use crate::search::{SearchError, search_target_size};
use crate::types::{ConversionOutput, ConversionRequest, ImageSource};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("{} is also the destination of an earlier request", .0.display())]
    DuplicateDestination(PathBuf),
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<SearchError> for ConvertError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Encode(e) => ConvertError::Encode(e),
            SearchError::Cancelled(c) => ConvertError::Cancelled(c),
        }
    }
}

impl ConvertError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Cancelled(_))
    }
}

/// What the encode stage produced, before metadata.
struct Encoded {
    artifact: EncodedArtifact,
    dimensions: Dimensions,
    quality: Quality,
    budget_met: Option<bool>,
    attempts: u32,
}

/// Run one conversion request to completion.
pub fn convert(
    backend: &impl ImageBackend,
    request: &ConversionRequest,
    config: &EngineConfig,
    progress: &Progress,
) -> Result<ConversionOutput, ConvertError> {
    progress.report(0.0);
    progress.checkpoint()?;

    let source = request.source.read().map_err(DecodeError::Unreadable)?;
    let declared = request.source.declared_mime(&source);
    let codec = resolve_format(request.target_format, declared.as_deref());
    debug!(
        "{}: declared {:?}, encoding as {}",
        request.source.label(),
        declared,
        codec
    );

    // Decode
    let info = backend.probe(&source)?;
    let sample_size = sample_size_for(info.dimensions, &request.resize, request.rotation_degrees);
    let raster = backend.decode(&source, sample_size)?;
    progress.report(0.2);
    progress.checkpoint()?;

    // Geometry
    let raster = if request.rotation_degrees != 0.0 {
        transform::rotate(raster, request.rotation_degrees)
    } else {
        raster
    };
    let raster = transform::resize(raster, &request.resize);
    progress.report(0.4);
    progress.checkpoint()?;

    // Color
    let raster = match &request.adjustments {
        Some(spec) if !spec.is_neutral() => color::adjust(&raster, spec),
        _ => raster,
    };
    progress.report(0.5);
    progress.checkpoint()?;

    // Encode, with one fallback to JPEG
    let interval = Duration::from_millis(config.progress.ramp_interval_ms);
    let (encoded, fell_back_from) = progress.ramp(0.5, 0.9, interval, || {
        match encode_stage(backend, &raster, codec, request, config, progress) {
            Err(SearchError::Encode(err)) if codec != Codec::DEFAULT => {
                warn!(
                    "{}: {} encode failed ({}), falling back to {}",
                    request.source.label(),
                    codec,
                    err,
                    Codec::DEFAULT
                );
                encode_stage(backend, &raster, Codec::DEFAULT, request, config, progress)
                    .map(|encoded| (encoded, Some(codec)))
            }
            other => other.map(|encoded| (encoded, None)),
        }
    })?;
    drop(raster);
    progress.checkpoint()?;

    // Metadata (best-effort)
    let final_codec = encoded.artifact.codec;
    let mut bytes = encoded.artifact.bytes;
    let mut metadata_copied = false;
    if request.keep_metadata {
        match transfer_metadata(&source, &bytes, final_codec) {
            Ok(with_tags) => {
                bytes = with_tags;
                metadata_copied = true;
            }
            Err(MetadataError::NoSourceMetadata) => {
                debug!("{}: no EXIF to copy", request.source.label());
            }
            Err(err) => {
                warn!(
                    "{}: metadata not copied: {}",
                    request.source.label(),
                    err
                );
            }
        }
    }

    // Write
    let destination = match &request.destination {
        Some(path) => {
            write_output(path, &bytes)?;
            Some(path.clone())
        }
        None => None,
    };

    let budget_met = match (encoded.budget_met, request.target_byte_budget) {
        (Some(_), Some(budget)) => Some(bytes.len() as u64 <= budget),
        (met, _) => met,
    };

    info!(
        "{}: {} {}x{} q{} {} bytes",
        request.source.label(),
        final_codec,
        encoded.dimensions.width,
        encoded.dimensions.height,
        encoded.quality,
        bytes.len()
    );
    progress.report(1.0);

    Ok(ConversionOutput {
        bytes,
        codec: final_codec,
        dimensions: encoded.dimensions,
        quality: encoded.quality,
        budget_met,
        fell_back_from,
        metadata_copied,
        encode_attempts: encoded.attempts,
        destination,
    })
}

fn encode_stage(
    backend: &impl ImageBackend,
    raster: &RasterBuffer,
    codec: Codec,
    request: &ConversionRequest,
    config: &EngineConfig,
    progress: &Progress,
) -> Result<Encoded, SearchError> {
    match request.target_byte_budget {
        Some(budget) => {
            let outcome =
                search_target_size(backend, raster, codec, budget, &config.search, progress)?;
            Ok(Encoded {
                artifact: outcome.artifact,
                dimensions: outcome.dimensions,
                quality: outcome.quality,
                budget_met: Some(outcome.budget_met),
                attempts: outcome.encode_attempts,
            })
        }
        None => {
            progress.checkpoint()?;
            let artifact = backend.encode(raster, codec, request.quality)?;
            Ok(Encoded {
                artifact,
                dimensions: raster.dimensions(),
                quality: request.quality,
                budget_met: None,
                attempts: 1,
            })
        }
    }
}

/// Subsampling factor for the decode.
///
/// A quarter-turn swaps the axes the resize bound applies to. Any other
/// non-trivial angle grows the bounding box, so such requests decode at
/// full resolution.
fn sample_size_for(source: Dimensions, resize: &ResizeSpec, rotation_degrees: f64) -> u32 {
    let Some(bound) = decode_bound(resize) else {
        return 1;
    };
    let turns = rotation_degrees.rem_euclid(360.0) / 90.0;
    if (turns - turns.round()).abs() > 1e-9 {
        return 1;
    }
    if turns.round() as u32 % 2 == 1 {
        calculate_sample_size(source, Dimensions::new(bound.height, bound.width))
    } else {
        calculate_sample_size(source, bound)
    }
}

/// Write `bytes` to `path`, creating parent directories as needed.
fn write_output(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let io_err = |source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, bytes).map_err(io_err)
}

/// Header-level facts about a source, read without decoding pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub label: String,
    pub declared_mime: Option<String>,
    pub dimensions: Dimensions,
    pub container: Option<&'static str>,
    pub byte_size: u64,
    /// What a "keep original" request would encode as.
    pub keep_original_codec: Codec,
}

pub fn probe_source(
    backend: &impl ImageBackend,
    source: &ImageSource,
) -> Result<ProbeReport, DecodeError> {
    let bytes: Cow<[u8]> = source.read()?;
    let declared_mime = source.declared_mime(&bytes);
    let info = backend.probe(&bytes)?;
    Ok(ProbeReport {
        label: source.label(),
        keep_original_codec: crate::imaging::format::codec_for_mime(declared_mime.as_deref()),
        declared_mime,
        dimensions: info.dimensions,
        container: info.container,
        byte_size: bytes.len() as u64,
    })
}
