//! End-to-end conversions through the public API with the real backend.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imgpress::batch::convert_batch;
use imgpress::config::{EngineConfig, load_config};
use imgpress::convert::convert;
use imgpress::document::write_pdf;
use imgpress::history::{HistoryEntry, append_history};
use imgpress::imaging::{Codec, Dimensions, ImageBackend, ResizeSpec, RustBackend, TargetFormat};
use imgpress::progress::{CancellationToken, Progress};
use imgpress::types::{ConversionRequest, ImageSource};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Noisy enough that JPEG size depends visibly on quality.
fn photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let n = x.wrapping_mul(2654435761).wrapping_add(y.wrapping_mul(40503)) >> 7;
        Rgba([
            (x * 255 / width) as u8 ^ (n as u8 & 0x1f),
            (y * 255 / height) as u8 ^ ((n >> 8) as u8 & 0x1f),
            (n >> 16) as u8,
            255,
        ])
    })
}

fn write_image(dir: &Path, name: &str, format: ImageFormat, width: u32, height: u32) -> PathBuf {
    let mut out = Cursor::new(Vec::new());
    let img = DynamicImage::ImageRgba8(photo(width, height));
    let img = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };
    img.write_to(&mut out, format).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, out.into_inner()).unwrap();
    path
}

#[test]
fn resize_to_jpeg_fits_box() {
    let tmp = TempDir::new().unwrap();
    let input = write_image(tmp.path(), "wide.png", ImageFormat::Png, 1600, 900);

    let mut request = ConversionRequest::new(ImageSource::from_path(&input));
    request.destination = Some(tmp.path().join("out/wide.jpg"));
    request.target_format = TargetFormat::Jpeg;
    request.resize = ResizeSpec {
        width: Some(800),
        height: Some(600),
        maintain_aspect: true,
    };

    let backend = RustBackend::new();
    let out = convert(&backend, &request, &EngineConfig::default(), &Progress::silent()).unwrap();

    assert_eq!(out.codec, Codec::Jpeg);
    assert_eq!(out.dimensions, Dimensions::new(800, 450));
    let written = out.destination.unwrap();
    assert_eq!(written, tmp.path().join("out/wide.jpg"));
    let info = backend.probe(&std::fs::read(written).unwrap()).unwrap();
    assert_eq!(info.dimensions, Dimensions::new(800, 450));
}

#[test]
fn keep_original_webp_stays_webp() {
    let tmp = TempDir::new().unwrap();
    let input = write_image(tmp.path(), "in.webp", ImageFormat::WebP, 64, 64);

    let request = ConversionRequest::new(ImageSource::from_path(&input));
    let out = convert(
        &RustBackend::new(),
        &request,
        &EngineConfig::default(),
        &Progress::silent(),
    )
    .unwrap();
    assert_eq!(out.codec, Codec::WebP);
}

#[test]
fn budget_search_produces_fitting_jpeg() {
    let tmp = TempDir::new().unwrap();
    let input = write_image(tmp.path(), "big.jpg", ImageFormat::Jpeg, 640, 480);

    let mut request = ConversionRequest::new(ImageSource::from_path(&input));
    request.target_format = TargetFormat::Jpeg;
    request.target_byte_budget = Some(20_000);

    let backend = RustBackend::new();
    let out = convert(&backend, &request, &EngineConfig::default(), &Progress::silent()).unwrap();

    assert_eq!(out.budget_met, Some(true));
    assert!(out.byte_length() <= 20_000);
    assert!(out.encode_attempts > 1);
    // The reported artifact is a real, decodable file
    assert!(backend.decode(&out.bytes, 1).is_ok());
}

#[test]
fn impossible_budget_reports_miss_with_real_bytes() {
    let tmp = TempDir::new().unwrap();
    let input = write_image(tmp.path(), "a.png", ImageFormat::Png, 300, 300);

    let mut request = ConversionRequest::new(ImageSource::from_path(&input));
    request.target_byte_budget = Some(100);

    let backend = RustBackend::new();
    let out = convert(&backend, &request, &EngineConfig::default(), &Progress::silent()).unwrap();

    assert_eq!(out.codec, Codec::Png);
    assert_eq!(out.budget_met, Some(false));
    assert!(out.dimensions.width > 50 && out.dimensions.height > 50);
    assert!(backend.decode(&out.bytes, 1).is_ok());
}

#[test]
fn batch_with_history_log() {
    let tmp = TempDir::new().unwrap();
    let inputs = [
        write_image(tmp.path(), "1.png", ImageFormat::Png, 40, 30),
        write_image(tmp.path(), "2.jpg", ImageFormat::Jpeg, 40, 30),
    ];
    let requests: Vec<ConversionRequest> = inputs
        .iter()
        .map(|path| {
            let mut r = ConversionRequest::new(ImageSource::from_path(path));
            let name = path.with_extension("webp");
            r.destination = Some(tmp.path().join("out").join(name.file_name().unwrap()));
            r.target_format = TargetFormat::WebP;
            r
        })
        .collect();

    let report = convert_batch(
        &RustBackend::new(),
        &requests,
        &EngineConfig::default(),
        &CancellationToken::new(),
        None,
    );
    assert_eq!(report.summary().to_string(), "converted 2 of 2");
    assert!(report.items.iter().all(|item| item.bytes.is_none()));

    let log = tmp.path().join("history.jsonl");
    let entries: Vec<HistoryEntry> = report
        .outputs()
        .map(|(item, summary)| HistoryEntry::from_summary(summary, &item.label))
        .collect();
    append_history(&log, &entries).unwrap();

    let content = std::fs::read_to_string(&log).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.contains("\"format\":\"webp\""));
    assert!(tmp.path().join("out/1.webp").exists());
    assert!(tmp.path().join("out/2.webp").exists());
}

#[test]
fn pdf_from_files() {
    let tmp = TempDir::new().unwrap();
    let sources = vec![
        ImageSource::from_path(write_image(tmp.path(), "p1.jpg", ImageFormat::Jpeg, 120, 80)),
        ImageSource::from_path(write_image(tmp.path(), "p2.png", ImageFormat::Png, 80, 120)),
    ];
    let out = tmp.path().join("book.pdf");

    let doc = write_pdf(
        &RustBackend::new(),
        &sources,
        &EngineConfig::default().document,
        &Progress::silent(),
        &out,
    )
    .unwrap();

    assert_eq!(doc.pages.len(), 2);
    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.5"));
}

#[test]
fn config_file_overrides_search_floor() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("imgpress.toml");
    std::fs::write(&path, "[search]\nquality_floor = 30\n").unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.search.quality_floor, 30);
    assert_eq!(config.search.quality_step, 10);
}
