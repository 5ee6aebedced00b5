//! # imgpress
//!
//! An image conversion engine that can hit a byte budget. Give it a source
//! image, an output format and optionally a maximum file size; it decodes,
//! transforms, and then searches quality and resolution until the encoded
//! output fits.
//!
//! # Pipeline
//!
//! ```text
//! source ─► resolve format ─► decode (subsampled) ─► rotate ─► resize
//!        ─► color matrix ─► encode / target-size search ─► EXIF transfer ─► output
//! ```
//!
//! Stages run strictly in order for one request. Independent requests run
//! in parallel through [`batch`]. The [`document`] assembler reuses the
//! decode half of the pipeline to build a multi-page PDF.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`convert`] | One request end to end, including the one-time JPEG fallback |
//! | [`search`] | Target-size search: quality steps first, then resolution |
//! | [`imaging`] | Codec backend trait, decode/resize math, transforms, color matrices, format resolution |
//! | [`metadata`] | Allow-listed EXIF copy from source to output |
//! | [`progress`] | Monotonic progress reporting and cooperative cancellation |
//! | [`batch`] | Parallel conversion of independent requests on a rayon pool |
//! | [`document`] | Ordered multi-page PDF assembly |
//! | [`history`] | `{path, format, byte_size, timestamp}` tuple for finished conversions |
//! | [`config`] | `imgpress.toml` loading, merging and validation |
//! | [`types`] | Request and output types |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Real Sizes Only
//!
//! Every size the search compares against the budget comes from an actual
//! encode. There is no size estimation: an estimate that is wrong by a few
//! percent makes the search return files that do not fit.
//!
//! ## Quality Before Resolution
//!
//! Lowering quality costs less visually than lowering resolution, so the
//! search walks quality down to its floor before it shrinks anything. Each
//! shrink resamples from the full-resolution raster; repeated shrinking of
//! an already shrunk copy would compound blur.
//!
//! ## Budget Misses Are Results
//!
//! An unreachable budget is not an error. The caller gets the last real
//! output the bounded search produced together with `budget_met = false`,
//! and decides what to do with it.
//!
//! ## Pure-Rust Codecs
//!
//! The default [`imaging::RustBackend`] is built on the `image` crate. No
//! system libraries are needed. HEIF has no pure-Rust encoder, so requesting
//! it exercises the JPEG fallback path.

pub mod batch;
pub mod config;
pub mod convert;
pub mod document;
pub mod history;
pub mod imaging;
pub mod metadata;
pub mod output;
pub mod progress;
pub mod search;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
