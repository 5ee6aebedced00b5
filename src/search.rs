//! Target-size search.
//!
//! Drives an encoder toward a byte budget by trading quality first and
//! resolution second:
//!
//! 1. Encode once at the initial quality (100). If it fits, stop.
//! 2. While over budget:
//!    - lossy codec above the quality floor → step quality down and re-encode;
//!    - otherwise → shrink both sides (0.7 when more than 2× over budget,
//!      0.9 otherwise) and re-encode at the last quality used.
//! 3. Stop when the output fits, when a shrink would reach the minimum
//!    dimension, after the resize-attempt ceiling, or after the iteration
//!    ceiling.
//!
//! The last artifact actually produced is always returned, with
//! [`SearchOutcome::budget_met`] telling the caller whether it fits. Sizes
//! come from real encodes only.
//!
//! Cancellation is checked at the top of every iteration. An encode that
//! has started always finishes first.

use crate::config::SearchConfig;
use crate::imaging::backend::{EncodeError, EncodedArtifact, ImageBackend};
use crate::imaging::calculations::scale_dimensions;
use crate::imaging::transform::resampled;
use crate::imaging::{Codec, Dimensions, Quality, RasterBuffer};
use crate::progress::{Cancelled, Progress};
use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Result of a search. Always carries a real artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub artifact: EncodedArtifact,
    /// Dimensions the final artifact was encoded at.
    pub dimensions: Dimensions,
    pub quality: Quality,
    pub budget_met: bool,
    pub encode_attempts: u32,
    pub resize_attempts: u32,
}

/// Search for an encoding of `raster` no larger than `budget` bytes.
pub fn search_target_size(
    backend: &impl ImageBackend,
    raster: &RasterBuffer,
    codec: Codec,
    budget: u64,
    config: &SearchConfig,
    progress: &Progress,
) -> Result<SearchOutcome, SearchError> {
    progress.checkpoint()?;

    let floor = Quality::new(config.quality_floor);
    let mut quality = Quality::new(config.initial_quality);
    // Shrunk copy of `raster`, once resolution reduction has started.
    let mut shrunk: Option<RasterBuffer> = None;

    let mut artifact = backend.encode(raster, codec, quality)?;
    let mut encode_attempts = 1;
    let mut resize_attempts = 0;
    let mut iterations = 0;
    log_attempt(&artifact, raster.dimensions(), quality, budget);

    while artifact.byte_length() > budget {
        progress.checkpoint()?;
        if iterations >= config.max_iterations {
            debug!("search: iteration ceiling {} reached", config.max_iterations);
            break;
        }
        iterations += 1;

        if !codec.is_lossless() && quality > floor {
            quality = quality.reduced_by(config.quality_step, floor);
        } else {
            if resize_attempts >= config.max_resize_attempts {
                debug!("search: resize ceiling {} reached", config.max_resize_attempts);
                break;
            }
            let current = shrunk.as_ref().unwrap_or(raster).dimensions();
            let overshoot = artifact.byte_length() as f64 > config.aggressive_overshoot * budget as f64;
            let factor = if overshoot {
                config.aggressive_scale
            } else {
                config.gentle_scale
            };
            let next = scale_dimensions(current, factor);
            if next.width <= config.min_dimension || next.height <= config.min_dimension {
                debug!(
                    "search: refusing {}x{} (minimum side {})",
                    next.width, next.height, config.min_dimension
                );
                break;
            }
            resize_attempts += 1;
            // Always resample from the full raster so blur does not compound.
            shrunk = resampled(raster, next);
        }

        let target = shrunk.as_ref().unwrap_or(raster);
        artifact = backend.encode(target, codec, quality)?;
        encode_attempts += 1;
        log_attempt(&artifact, target.dimensions(), quality, budget);
    }

    let dimensions = shrunk.as_ref().unwrap_or(raster).dimensions();
    Ok(SearchOutcome {
        budget_met: artifact.byte_length() <= budget,
        artifact,
        dimensions,
        quality,
        encode_attempts,
        resize_attempts,
    })
}

fn log_attempt(artifact: &EncodedArtifact, dims: Dimensions, quality: Quality, budget: u64) {
    debug!(
        "search: {} q={} {}x{} → {} bytes (budget {})",
        artifact.codec,
        quality.value(),
        dims.width,
        dims.height,
        artifact.byte_length(),
        budget
    );
}
