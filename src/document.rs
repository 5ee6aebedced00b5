//! Multi-page PDF assembly.
//!
//! Sources are processed one at a time and in order: header probe, decode
//! subsampled toward the page footprint, JPEG encode, then one page whose
//! MediaBox equals the decoded raster size with the image drawn full-bleed.
//!
//! After page `i` (0-based) of `N`, progress reports `i / N`; 1.0 follows
//! once the document is serialized. Cancellation is checked before every
//! page. A cancelled or failed run drops the whole document: nothing is
//! ever written for a partial sequence.

use std::path::Path;

use log::{debug, info};
use lopdf::{Document, Object, Stream, dictionary};
use thiserror::Error;

use crate::config::DocumentConfig;
use crate::imaging::calculations::calculate_sample_size;
use crate::imaging::{Codec, DecodeError, Dimensions, EncodeError, ImageBackend, Quality};
use crate::progress::{Cancelled, Progress};
use crate::types::ImageSource;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("no pages to assemble")]
    Empty,
    #[error("page {page}: {source}")]
    Decode { page: usize, source: DecodeError },
    #[error("page {page}: {source}")]
    Encode { page: usize, source: EncodeError },
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished document.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub bytes: Vec<u8>,
    /// Size of each page, in order.
    pub pages: Vec<Dimensions>,
}

/// Build a PDF with one page per source.
pub fn assemble_pdf(
    backend: &impl ImageBackend,
    sources: &[ImageSource],
    config: &DocumentConfig,
    progress: &Progress,
) -> Result<AssembledDocument, DocumentError> {
    if sources.is_empty() {
        return Err(DocumentError::Empty);
    }

    let footprint = Dimensions::new(config.page_width, config.page_height);
    let quality = Quality::new(config.quality);
    let total = sources.len();

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(total);
    let mut pages = Vec::with_capacity(total);

    for (index, source) in sources.iter().enumerate() {
        progress.checkpoint()?;

        let bytes = source
            .read()
            .map_err(|e| DocumentError::Decode {
                page: index + 1,
                source: DecodeError::Unreadable(e),
            })?;
        let decode_err = |source| DocumentError::Decode {
            page: index + 1,
            source,
        };
        let info = backend.probe(&bytes).map_err(decode_err)?;
        let sample_size = calculate_sample_size(info.dimensions, footprint);
        let raster = backend.decode(&bytes, sample_size).map_err(decode_err)?;
        let size = raster.dimensions();

        let jpeg = backend
            .encode(&raster, Codec::Jpeg, quality)
            .map_err(|source| DocumentError::Encode {
                page: index + 1,
                source,
            })?;
        drop(raster);
        debug!(
            "page {}: {} decoded at 1/{} to {}, {} bytes",
            index + 1,
            source.label(),
            sample_size,
            size,
            jpeg.byte_length()
        );

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => size.width as i64,
                "Height" => size.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.bytes,
        ));
        let content = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q\n", size.width, size.height);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(size.width as i64),
                Object::Integer(size.height as i64),
            ],
        });
        kids.push(Object::Reference(page_id));
        pages.push(size);

        progress.report(index as f32 / total as f32);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(lopdf::Error::from)?;
    progress.report(1.0);

    Ok(AssembledDocument { bytes, pages })
}

/// Assemble and write to `path`. The file is only created on success.
pub fn write_pdf(
    backend: &impl ImageBackend,
    sources: &[ImageSource],
    config: &DocumentConfig,
    progress: &Progress,
    path: &Path,
) -> Result<AssembledDocument, DocumentError> {
    let document = assemble_pdf(backend, sources, config, progress)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &document.bytes)?;
    info!(
        "wrote {} ({} pages, {} bytes)",
        path.display(),
        document.pages.len(),
        document.bytes.len()
    );
    Ok(document)
}
