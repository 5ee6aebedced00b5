//! Parallel batch conversion.
//!
//! Each request is independent and runs on the global rayon pool (sized by
//! `[processing] max_processes`). All items share one cancellation token.
//! Progress is reported per item as a [`BatchEvent`] on an optional channel,
//! in completion order, which is not submission order. The returned
//! [`BatchReport`] is in submission order.
//!
//! Encoded bytes are dropped as soon as an item has been written to its
//! destination; the report only keeps them for in-memory requests. Two
//! requests naming the same destination never race: every one after the
//! first fails without being converted.

use std::collections::HashSet;
use std::fmt;
use std::sync::mpsc::Sender;

use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::convert::{ConvertError, convert};
use crate::imaging::{Codec, Dimensions, ImageBackend};
use crate::progress::{CancellationToken, Progress};
use crate::types::{ConversionOutput, ConversionRequest};

/// What finished for one item, sent as soon as it is known.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Converted {
        index: usize,
        label: String,
        summary: ItemSummary,
    },
    Failed {
        index: usize,
        label: String,
        reason: String,
    },
    Cancelled {
        index: usize,
        label: String,
    },
}

/// The parts of a [`ConversionOutput`] worth reporting, without the bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    pub codec: Codec,
    pub dimensions: Dimensions,
    pub byte_size: u64,
    pub quality: u32,
    pub budget_met: Option<bool>,
    pub fell_back_from: Option<Codec>,
    pub metadata_copied: bool,
    pub destination: Option<String>,
}

impl From<&ConversionOutput> for ItemSummary {
    fn from(output: &ConversionOutput) -> Self {
        Self {
            codec: output.codec,
            dimensions: output.dimensions,
            byte_size: output.byte_length(),
            quality: output.quality.value(),
            budget_met: output.budget_met,
            fell_back_from: output.fell_back_from,
            metadata_copied: output.metadata_copied,
            destination: output.destination.as_ref().map(|p| p.display().to_string()),
        }
    }
}

#[derive(Debug)]
pub struct BatchItem {
    pub index: usize,
    pub label: String,
    pub result: Result<ItemSummary, ConvertError>,
    /// Encoded output, kept only when the request had no destination.
    pub bytes: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.items.len(),
            ..BatchSummary::default()
        };
        for item in &self.items {
            match &item.result {
                Ok(_) => summary.converted += 1,
                Err(e) if e.is_cancelled() => summary.cancelled += 1,
                Err(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&BatchItem, &ItemSummary)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().ok().map(|out| (item, out)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BatchSummary {
    pub fn any_converted(&self) -> bool {
        self.converted > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "converted {} of {}", self.converted, self.total)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        Ok(())
    }
}

/// Convert every request in parallel.
pub fn convert_batch(
    backend: &impl ImageBackend,
    requests: &[ConversionRequest],
    config: &EngineConfig,
    token: &CancellationToken,
    events: Option<Sender<BatchEvent>>,
) -> BatchReport {
    let duplicates = duplicate_destinations(requests);
    let items = requests
        .par_iter()
        .enumerate()
        .map_with(events, |events, (index, request)| {
            let label = request.source.label();
            let converted = match &request.destination {
                Some(path) if duplicates.contains(&index) => {
                    Err(ConvertError::DuplicateDestination(path.clone()))
                }
                _ => {
                    let progress = Progress::with_token(None, token.clone());
                    convert(backend, request, config, &progress)
                }
            };
            let (result, bytes) = match converted {
                Ok(output) => {
                    let summary = ItemSummary::from(&output);
                    let bytes = output.destination.is_none().then_some(output.bytes);
                    (Ok(summary), bytes)
                }
                Err(e) => (Err(e), None),
            };

            if let Some(tx) = events {
                let event = match &result {
                    Ok(summary) => BatchEvent::Converted {
                        index,
                        label: label.clone(),
                        summary: summary.clone(),
                    },
                    Err(e) if e.is_cancelled() => BatchEvent::Cancelled {
                        index,
                        label: label.clone(),
                    },
                    Err(e) => BatchEvent::Failed {
                        index,
                        label: label.clone(),
                        reason: e.to_string(),
                    },
                };
                // Receiver gone just means nobody is listening.
                let _ = tx.send(event);
            }

            BatchItem {
                index,
                label,
                result,
                bytes,
            }
        })
        .collect();

    BatchReport { items }
}

/// Indices of requests whose destination was already claimed by an earlier one.
fn duplicate_destinations(requests: &[ConversionRequest]) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();
    for (index, request) in requests.iter().enumerate() {
        if let Some(path) = &request.destination {
            if !seen.insert(path) {
                duplicates.insert(index);
            }
        }
    }
    duplicates
}
