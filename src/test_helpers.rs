//! Shared fixtures for the imgpress test suite.
//!
//! Everything is synthesized in memory: small JPEG/PNG/WebP files with a
//! gradient so encoders have something to compress, and hand-built EXIF
//! blocks with a known set of tags.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let source = jpeg_with_exif(64, 48, &sample_exif_tiff(ByteOrder::Little));
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = write_fixture(tmp.path(), "photo.jpg", &source);
//! ```

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};

pub use crate::metadata::ByteOrder;

// =========================================================================
// Encoded image fixtures
// =========================================================================

/// A `width` x `height` RGBA gradient.
pub fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
    let rgb = DynamicImage::ImageRgba8(gradient(width, height)).to_rgb8();
    encode(DynamicImage::ImageRgb8(rgb), ImageFormat::Jpeg)
}

pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(gradient(width, height)), ImageFormat::Png)
}

pub fn webp_fixture(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgba8(gradient(width, height)), ImageFormat::WebP)
}

/// A JPEG fixture carrying `tiff` as its EXIF block.
pub fn jpeg_with_exif(width: u32, height: u32, tiff: &[u8]) -> Vec<u8> {
    let mut jpeg = Jpeg::from_bytes(Bytes::from(jpeg_fixture(width, height))).unwrap();
    jpeg.set_exif(Some(Bytes::copy_from_slice(tiff)));
    let mut out = Vec::new();
    jpeg.encoder().write_to(&mut out).unwrap();
    out
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

// =========================================================================
// EXIF fixtures
// =========================================================================

/// Which IFDs the synthesized EXIF block contains.
///
/// The primary IFD always holds Make, Model, Orientation, DateTime and a
/// non-allow-listed Software tag.
#[derive(Debug, Clone, Copy)]
pub struct ExifFixture {
    pub exif: bool,
    pub gps: bool,
}

impl Default for ExifFixture {
    fn default() -> Self {
        Self {
            exif: true,
            gps: true,
        }
    }
}

struct RawEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    value: Vec<u8>,
}

fn ascii(tag: u16, text: &str) -> RawEntry {
    let mut value = text.as_bytes().to_vec();
    value.push(0);
    RawEntry {
        tag,
        field_type: 2,
        count: value.len() as u32,
        value,
    }
}

impl ExifFixture {
    /// Build a TIFF block. Unlike the engine's writer, all out-of-line
    /// values are placed after the last IFD.
    pub fn build(&self, order: ByteOrder) -> Vec<u8> {
        let u16b = |v: u16| match order {
            ByteOrder::Little => v.to_le_bytes().to_vec(),
            ByteOrder::Big => v.to_be_bytes().to_vec(),
        };
        let u32b = |v: u32| match order {
            ByteOrder::Little => v.to_le_bytes().to_vec(),
            ByteOrder::Big => v.to_be_bytes().to_vec(),
        };
        let short = |tag: u16, v: u16| RawEntry {
            tag,
            field_type: 3,
            count: 1,
            value: u16b(v),
        };
        let rationals = |tag: u16, parts: &[(u32, u32)]| RawEntry {
            tag,
            field_type: 5,
            count: parts.len() as u32,
            value: parts
                .iter()
                .flat_map(|(n, d)| [u32b(*n), u32b(*d)].concat())
                .collect(),
        };
        let long = |tag: u16| RawEntry {
            tag,
            field_type: 4,
            count: 1,
            value: vec![0; 4],
        };

        let mut primary = vec![
            ascii(0x010F, "Canon"),
            ascii(0x0110, "EOS R5"),
            short(0x0112, 6),
            ascii(0x0131, "editor 2.1"),
            ascii(0x0132, "2024:05:06 07:08:09"),
        ];
        let exif = vec![
            ascii(0x9003, "2024:05:06 07:08:09"),
            short(0x9209, 16),
            rationals(0x920A, &[(50, 1)]),
        ];
        let gps = vec![
            ascii(0x0001, "N"),
            rationals(0x0002, &[(52, 1), (22, 1), (1234, 100)]),
            ascii(0x0003, "E"),
            rationals(0x0004, &[(4, 1), (53, 1), (5678, 100)]),
        ];

        if self.exif {
            primary.push(long(0x8769));
        }
        if self.gps {
            primary.push(long(0x8825));
        }

        let mut ifds = vec![primary];
        if self.exif {
            ifds.push(exif);
        }
        if self.gps {
            ifds.push(gps);
        }

        // IFD offsets first, then one shared data area.
        let mut offsets = Vec::new();
        let mut cursor = 8usize;
        for ifd in &ifds {
            offsets.push(cursor);
            cursor += 2 + 12 * ifd.len() + 4;
        }
        let data_start = cursor;

        let mut sub = offsets.iter().skip(1);
        for entry in ifds[0].iter_mut() {
            if entry.tag == 0x8769 || entry.tag == 0x8825 {
                entry.value = u32b(*sub.next().unwrap() as u32);
            }
        }

        let mut out = match order {
            ByteOrder::Little => b"II".to_vec(),
            ByteOrder::Big => b"MM".to_vec(),
        };
        out.extend(u16b(42));
        out.extend(u32b(8));

        let mut data: Vec<u8> = Vec::new();
        for ifd in &ifds {
            out.extend(u16b(ifd.len() as u16));
            for entry in ifd {
                out.extend(u16b(entry.tag));
                out.extend(u16b(entry.field_type));
                out.extend(u32b(entry.count));
                if entry.value.len() <= 4 {
                    let mut inline = entry.value.clone();
                    inline.resize(4, 0);
                    out.extend(inline);
                } else {
                    out.extend(u32b((data_start + data.len()) as u32));
                    data.extend(&entry.value);
                }
            }
            out.extend(u32b(0));
        }
        assert_eq!(out.len(), data_start);
        out.extend(data);
        out
    }
}

/// EXIF block with all three IFDs populated.
pub fn sample_exif_tiff(order: ByteOrder) -> Vec<u8> {
    ExifFixture::default().build(order)
}
