//! EXIF metadata transfer.
//!
//! After a successful encode, a fixed allow-list of tags is copied from the
//! source image's EXIF block into the freshly encoded output:
//!
//! | IFD | Tags |
//! |---|---|
//! | Primary | Orientation, DateTime, Make, Model |
//! | Exif | DateTimeOriginal, DateTimeDigitized, Flash, FocalLength, WhiteBalance |
//! | GPS | Latitude/Longitude/Altitude and their reference flags |
//!
//! Tags absent from the source are skipped, never synthesized. Values are
//! copied byte-for-byte in the source's byte order, so the destination
//! reads back exactly what the source held.
//!
//! Reading and writing the EXIF container uses `img-parts` (JPEG APP1, PNG
//! `eXIf`, WebP `EXIF` chunk). The TIFF structure inside is walked and
//! rebuilt here.
//!
//! The whole step is best-effort: callers log a [`MetadataError`] and keep
//! the already-encoded image unchanged.

use crate::imaging::Codec;
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::{Bytes, ImageEXIF};
use thiserror::Error;

/// Marker img-parts may leave in front of JPEG EXIF payloads.
const EXIF_PREFIX: &[u8] = b"Exif\0\0";

const TIFF_MAGIC: u16 = 42;
const TYPE_LONG: u16 = 4;

const TAG_EXIF_POINTER: u16 = 0x8769;
const TAG_GPS_POINTER: u16 = 0x8825;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("source carries no EXIF metadata")]
    NoSourceMetadata,
    #[error("malformed EXIF block: {0}")]
    Malformed(String),
    #[error("cannot write EXIF into {0} output")]
    UnsupportedContainer(Codec),
    #[error("container error: {0}")]
    Container(String),
}

/// The three IFDs the allow-list draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Ifd {
    Primary,
    Exif,
    Gps,
}

/// One allow-listed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagId {
    pub ifd: Ifd,
    pub tag: u16,
    pub name: &'static str,
}

const fn tag(ifd: Ifd, tag: u16, name: &'static str) -> TagId {
    TagId { ifd, tag, name }
}

/// Tags copied from source to destination, in copy order.
pub const ALLOWED_TAGS: &[TagId] = &[
    tag(Ifd::Primary, 0x0112, "Orientation"),
    tag(Ifd::Primary, 0x0132, "DateTime"),
    tag(Ifd::Primary, 0x010F, "Make"),
    tag(Ifd::Primary, 0x0110, "Model"),
    tag(Ifd::Exif, 0x9003, "DateTimeOriginal"),
    tag(Ifd::Exif, 0x9004, "DateTimeDigitized"),
    tag(Ifd::Exif, 0x9209, "Flash"),
    tag(Ifd::Exif, 0x920A, "FocalLength"),
    tag(Ifd::Exif, 0xA403, "WhiteBalance"),
    tag(Ifd::Gps, 0x0001, "GPSLatitudeRef"),
    tag(Ifd::Gps, 0x0002, "GPSLatitude"),
    tag(Ifd::Gps, 0x0003, "GPSLongitudeRef"),
    tag(Ifd::Gps, 0x0004, "GPSLongitude"),
    tag(Ifd::Gps, 0x0005, "GPSAltitudeRef"),
    tag(Ifd::Gps, 0x0006, "GPSAltitude"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16_bytes(self, v: u16) -> [u8; 2] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }

    fn u32_bytes(self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }
}

/// One IFD entry with its raw value bytes (in the block's byte order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifEntry {
    pub ifd: Ifd,
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    pub value: Vec<u8>,
}

/// A parsed EXIF block: entries of the primary, Exif and GPS IFDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExifTags {
    pub order: ByteOrder,
    pub entries: Vec<ExifEntry>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct TiffReader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl TiffReader<'_> {
    fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], MetadataError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| MetadataError::Malformed(format!("read past end at offset {offset}")))
    }

    fn u16(&self, offset: usize) -> Result<u16, MetadataError> {
        let b = self.bytes(offset, 2)?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32(&self, offset: usize) -> Result<u32, MetadataError> {
        let b = self.bytes(offset, 4)?;
        let arr = [b[0], b[1], b[2], b[3]];
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(arr),
            ByteOrder::Big => u32::from_be_bytes(arr),
        })
    }
}

/// TIFF type sizes: count is number of values, not bytes.
fn type_size(field_type: u16) -> usize {
    match field_type {
        1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
        3 | 8 => 2,         // SHORT, SSHORT
        4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
        5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
        _ => 1,
    }
}

fn read_ifd(reader: &TiffReader, offset: usize, ifd: Ifd) -> Result<Vec<ExifEntry>, MetadataError> {
    let entry_count = reader.u16(offset)? as usize;
    let mut entries = Vec::with_capacity(entry_count);

    for i in 0..entry_count {
        let entry_offset = offset + 2 + i * 12;
        let tag = reader.u16(entry_offset)?;
        let field_type = reader.u16(entry_offset + 2)?;
        let count = reader.u32(entry_offset + 4)?;
        let byte_len = (count as usize)
            .checked_mul(type_size(field_type))
            .ok_or_else(|| MetadataError::Malformed(format!("tag {tag:#06x} count overflow")))?;

        let value = if byte_len <= 4 {
            reader.bytes(entry_offset + 8, byte_len)?.to_vec()
        } else {
            let value_offset = reader.u32(entry_offset + 8)? as usize;
            reader.bytes(value_offset, byte_len)?.to_vec()
        };

        entries.push(ExifEntry {
            ifd,
            tag,
            field_type,
            count,
            value,
        });
    }
    Ok(entries)
}

impl ExifTags {
    /// Parse a TIFF-structured EXIF block (with or without the `Exif\0\0` prefix).
    pub fn parse(block: &[u8]) -> Result<Self, MetadataError> {
        let data = block.strip_prefix(EXIF_PREFIX).unwrap_or(block);
        let order = match data.get(0..2) {
            Some(b"II") => ByteOrder::Little,
            Some(b"MM") => ByteOrder::Big,
            _ => return Err(MetadataError::Malformed("missing byte order mark".into())),
        };
        let reader = TiffReader { data, order };
        if reader.u16(2)? != TIFF_MAGIC {
            return Err(MetadataError::Malformed("bad TIFF magic".into()));
        }

        let primary = read_ifd(&reader, reader.u32(4)? as usize, Ifd::Primary)?;
        let mut entries = Vec::new();
        for entry in &primary {
            let sub_ifd = match entry.tag {
                TAG_EXIF_POINTER => Ifd::Exif,
                TAG_GPS_POINTER => Ifd::Gps,
                _ => continue,
            };
            let offset = inline_u32(order, &entry.value)? as usize;
            entries.extend(read_ifd(&reader, offset, sub_ifd)?);
        }
        entries.extend(primary);
        Ok(Self { order, entries })
    }

    pub fn get(&self, ifd: Ifd, tag: u16) -> Option<&ExifEntry> {
        self.entries.iter().find(|e| e.ifd == ifd && e.tag == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every allow-listed tag that is present; skip the rest.
    pub fn allowed_subset(&self) -> ExifTags {
        let entries = ALLOWED_TAGS
            .iter()
            .filter_map(|id| self.get(id.ifd, id.tag).cloned())
            .collect();
        ExifTags {
            order: self.order,
            entries,
        }
    }

    /// Names of the allow-listed tags present in this block.
    pub fn allowed_names(&self) -> Vec<&'static str> {
        ALLOWED_TAGS
            .iter()
            .filter(|id| self.get(id.ifd, id.tag).is_some())
            .map(|id| id.name)
            .collect()
    }

    /// Serialize as a TIFF block (no `Exif\0\0` prefix).
    ///
    /// Layout: header, primary IFD, Exif IFD, GPS IFD, each IFD followed by
    /// its out-of-line values. Pointer tags are regenerated.
    pub fn to_tiff(&self) -> Vec<u8> {
        let order = self.order;
        let pick = |ifd: Ifd| -> Vec<ExifEntry> {
            self.entries
                .iter()
                .filter(|e| e.ifd == ifd && e.tag != TAG_EXIF_POINTER && e.tag != TAG_GPS_POINTER)
                .cloned()
                .collect()
        };
        let mut primary = pick(Ifd::Primary);
        let exif = pick(Ifd::Exif);
        let gps = pick(Ifd::Gps);

        let pointer = |tag: u16| ExifEntry {
            ifd: Ifd::Primary,
            tag,
            field_type: TYPE_LONG,
            count: 1,
            value: vec![0; 4],
        };
        if !exif.is_empty() {
            primary.push(pointer(TAG_EXIF_POINTER));
        }
        if !gps.is_empty() {
            primary.push(pointer(TAG_GPS_POINTER));
        }

        let exif_offset = 8 + ifd_size(&primary);
        let gps_offset = exif_offset + if exif.is_empty() { 0 } else { ifd_size(&exif) };
        for entry in &mut primary {
            match entry.tag {
                TAG_EXIF_POINTER => entry.value = order.u32_bytes(exif_offset as u32).to_vec(),
                TAG_GPS_POINTER => entry.value = order.u32_bytes(gps_offset as u32).to_vec(),
                _ => {}
            }
        }

        let mut out = Vec::with_capacity(gps_offset + ifd_size(&gps));
        out.extend_from_slice(match order {
            ByteOrder::Little => b"II",
            ByteOrder::Big => b"MM",
        });
        out.extend_from_slice(&order.u16_bytes(TIFF_MAGIC));
        out.extend_from_slice(&order.u32_bytes(8));
        write_ifd(&mut out, order, primary);
        if !exif.is_empty() {
            write_ifd(&mut out, order, exif);
        }
        if !gps.is_empty() {
            write_ifd(&mut out, order, gps);
        }
        out
    }
}

fn inline_u32(order: ByteOrder, value: &[u8]) -> Result<u32, MetadataError> {
    let b: [u8; 4] = value
        .get(0..4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| MetadataError::Malformed("short IFD pointer".into()))?;
    Ok(match order {
        ByteOrder::Little => u32::from_le_bytes(b),
        ByteOrder::Big => u32::from_be_bytes(b),
    })
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn out_of_line_len(entry: &ExifEntry) -> usize {
    let len = entry.value.len();
    if len <= 4 { 0 } else { len + len % 2 }
}

fn ifd_size(entries: &[ExifEntry]) -> usize {
    2 + 12 * entries.len() + 4 + entries.iter().map(out_of_line_len).sum::<usize>()
}

fn write_ifd(out: &mut Vec<u8>, order: ByteOrder, mut entries: Vec<ExifEntry>) {
    entries.sort_by_key(|e| e.tag);
    let start = out.len();
    let mut data_offset = start + 2 + 12 * entries.len() + 4;
    let mut data = Vec::new();

    out.extend_from_slice(&order.u16_bytes(entries.len() as u16));
    for entry in &entries {
        out.extend_from_slice(&order.u16_bytes(entry.tag));
        out.extend_from_slice(&order.u16_bytes(entry.field_type));
        out.extend_from_slice(&order.u32_bytes(entry.count));
        if entry.value.len() <= 4 {
            let mut inline = [0u8; 4];
            inline[..entry.value.len()].copy_from_slice(&entry.value);
            out.extend_from_slice(&inline);
        } else {
            out.extend_from_slice(&order.u32_bytes(data_offset as u32));
            data.extend_from_slice(&entry.value);
            if entry.value.len() % 2 == 1 {
                data.push(0);
            }
            data_offset = start + 2 + 12 * entries.len() + 4 + data.len();
        }
    }
    // No next IFD.
    out.extend_from_slice(&order.u32_bytes(0));
    out.extend_from_slice(&data);
}

// ---------------------------------------------------------------------------
// Container access
// ---------------------------------------------------------------------------

/// Extract the raw EXIF block from a JPEG, PNG or WebP file.
pub fn read_exif_block(bytes: &[u8]) -> Option<Vec<u8>> {
    let data = Bytes::copy_from_slice(bytes);

    if let Ok(jpeg) = Jpeg::from_bytes(data.clone()) {
        return jpeg.exif().map(|exif| exif.to_vec());
    }
    if let Ok(png) = Png::from_bytes(data.clone()) {
        return png.exif().map(|exif| exif.to_vec());
    }
    if let Ok(webp) = WebP::from_bytes(data) {
        return webp.exif().map(|exif| exif.to_vec());
    }
    None
}

/// Parse the EXIF block of any supported container.
pub fn read_exif(bytes: &[u8]) -> Result<ExifTags, MetadataError> {
    let block = read_exif_block(bytes).ok_or(MetadataError::NoSourceMetadata)?;
    ExifTags::parse(&block)
}

/// Replace the EXIF block of an encoded image.
pub fn write_exif(encoded: &[u8], codec: Codec, tiff: Vec<u8>) -> Result<Vec<u8>, MetadataError> {
    let data = Bytes::copy_from_slice(encoded);
    let exif = Some(Bytes::from(tiff));
    let container = |e: img_parts::Error| MetadataError::Container(e.to_string());
    let mut out = Vec::with_capacity(encoded.len() + 512);

    match codec {
        Codec::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(data).map_err(container)?;
            jpeg.set_exif(exif);
            jpeg.encoder().write_to(&mut out)
        }
        Codec::Png => {
            let mut png = Png::from_bytes(data).map_err(container)?;
            png.set_exif(exif);
            png.encoder().write_to(&mut out)
        }
        Codec::WebP => {
            let mut webp = WebP::from_bytes(data).map_err(container)?;
            webp.set_exif(exif);
            webp.encoder().write_to(&mut out)
        }
        other => return Err(MetadataError::UnsupportedContainer(other)),
    }
    .map_err(|e| MetadataError::Container(e.to_string()))?;

    Ok(out)
}

/// Copy the allow-listed tags of `source` into `encoded`.
///
/// Returns the new encoded bytes. On any error the caller keeps `encoded`
/// as it was.
pub fn transfer_metadata(
    source: &[u8],
    encoded: &[u8],
    codec: Codec,
) -> Result<Vec<u8>, MetadataError> {
    if !matches!(codec, Codec::Jpeg | Codec::Png | Codec::WebP) {
        return Err(MetadataError::UnsupportedContainer(codec));
    }
    let allowed = read_exif(source)?.allowed_subset();
    if allowed.is_empty() {
        return Err(MetadataError::NoSourceMetadata);
    }
    write_exif(encoded, codec, allowed.to_tiff())
}
