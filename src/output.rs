//! CLI output formatting.
//!
//! Every entity is shown the same way: a header line with its 1-based
//! position and name, then indented context lines.
//!
//! ## Convert
//!
//! ```text
//! 001 photos/dawn.jpg
//!     → out/dawn.webp
//!     WEBP 800x450, 41230 bytes
//!     budget met
//! 002 photos/broken.png
//!     failed: corrupt or truncated image: ...
//!
//! converted 1 of 2, 1 failed
//! ```
//!
//! ## Probe
//!
//! ```text
//! photos/dawn.jpg
//!     Declared: image/jpeg
//!     Container: image/jpeg
//!     Size: 4000x3000, 2811342 bytes
//!     Keep original: JPEG
//! ```
//!
//! Each `format_*` function is pure and returns `Vec<String>`; the `print_*`
//! wrappers write the lines to stdout.

use std::path::Path;

use crate::batch::{BatchEvent, BatchSummary, ItemSummary};
use crate::convert::ProbeReport;
use crate::document::AssembledDocument;

/// Format a 0-based batch index as a 3-digit 1-based position.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

/// 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn item_lines(summary: &ItemSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(dest) = &summary.destination {
        lines.push(format!("{}→ {}", indent(1), dest));
    }
    let quality = if summary.codec.is_lossless() {
        String::new()
    } else {
        format!(" q{}", summary.quality)
    };
    lines.push(format!(
        "{}{} {}{}, {} bytes",
        indent(1),
        summary.codec,
        summary.dimensions,
        quality,
        summary.byte_size
    ));
    if let Some(from) = summary.fell_back_from {
        lines.push(format!("{}{} encode failed, fell back to {}", indent(1), from, summary.codec));
    }
    match summary.budget_met {
        Some(true) => lines.push(format!("{}budget met", indent(1))),
        Some(false) => lines.push(format!("{}budget not met (last output kept)", indent(1))),
        None => {}
    }
    if summary.metadata_copied {
        lines.push(format!("{}metadata copied", indent(1)));
    }
    lines
}

pub fn format_batch_event(event: &BatchEvent) -> Vec<String> {
    match event {
        BatchEvent::Converted {
            index,
            label,
            summary,
        } => {
            let mut lines = vec![format!("{} {}", format_index(*index), label)];
            lines.extend(item_lines(summary));
            lines
        }
        BatchEvent::Failed {
            index,
            label,
            reason,
        } => vec![
            format!("{} {}", format_index(*index), label),
            format!("{}failed: {}", indent(1), reason),
        ],
        BatchEvent::Cancelled { index, label } => vec![
            format!("{} {}", format_index(*index), label),
            format!("{}cancelled", indent(1)),
        ],
    }
}

pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    vec![String::new(), summary.to_string()]
}

pub fn print_batch_summary(summary: &BatchSummary) {
    for line in format_batch_summary(summary) {
        println!("{}", line);
    }
}

pub fn format_probe(report: &ProbeReport) -> Vec<String> {
    vec![
        report.label.clone(),
        format!(
            "{}Declared: {}",
            indent(1),
            report.declared_mime.as_deref().unwrap_or("unknown")
        ),
        format!(
            "{}Container: {}",
            indent(1),
            report.container.unwrap_or("unknown")
        ),
        format!(
            "{}Size: {}, {} bytes",
            indent(1),
            report.dimensions,
            report.byte_size
        ),
        format!("{}Keep original: {}", indent(1), report.keep_original_codec),
    ]
}

pub fn print_probe(report: &ProbeReport) {
    for line in format_probe(report) {
        println!("{}", line);
    }
}

pub fn format_document(document: &AssembledDocument, path: &Path) -> Vec<String> {
    let mut lines = vec![format!("{}", path.display())];
    for (index, page) in document.pages.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(1), format_index(index), page));
    }
    lines.push(String::new());
    lines.push(format!(
        "Wrote {} pages, {} bytes",
        document.pages.len(),
        document.bytes.len()
    ));
    lines
}

pub fn print_document(document: &AssembledDocument, path: &Path) {
    for line in format_document(document, path) {
        println!("{}", line);
    }
}
