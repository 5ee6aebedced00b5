//! Image processing: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Probe / decode** | `image::ImageReader` + `imageops::thumbnail` subsampling |
//! | **Rotate** | `imageops::rotate90/180/270`, bilinear inverse mapping otherwise |
//! | **Resize** | `imageops::resize` with `Lanczos3` |
//! | **Color** | composite 4×5 matrix, applied in one pass |
//! | **Encode** | `image` codecs (JPEG, PNG, WebP lossless, BMP, AVIF) |
//! | **Type sniffing** | `infer` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Raster / transform / color**: owned pixel buffers and the stages that
//!   turn one buffer into the next
//! - **Format**: output codecs and "keep original" resolution

pub mod backend;
pub mod calculations;
pub mod color;
pub mod format;
mod params;
mod raster;
pub mod rust_backend;
pub mod transform;

pub use backend::{DecodeError, EncodeError, EncodedArtifact, ImageBackend, SourceInfo};
pub use color::{ColorAdjustmentSpec, ColorMatrix, FilterPreset};
pub use format::{Codec, TargetFormat, resolve_format};
pub use params::{Dimensions, Quality, ResizeSpec};
pub use raster::RasterBuffer;
pub use rust_backend::RustBackend;
