//! Engine configuration.
//!
//! Handles loading, validating, and merging `imgpress.toml` files. The
//! resulting [`EngineConfig`] is an explicit value handed to every engine
//! entry point; nothing reads configuration from global state.
//!
//! ## Config File Location
//!
//! The CLI looks for `imgpress.toml` in the working directory, or loads the
//! file named by `--config`. Stock defaults sit underneath either one.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [search]
//! initial_quality = 100      # First encode of the target-size search
//! quality_step = 10          # Quality decrement per lossy step
//! quality_floor = 10         # Lowest quality ever attempted
//! min_dimension = 50         # Resize refused when either side would be <= this
//! max_resize_attempts = 20
//! max_iterations = 64
//! aggressive_overshoot = 2.0 # size > overshoot * budget → aggressive scale
//! aggressive_scale = 0.7
//! gentle_scale = 0.9
//!
//! [decode]
//! max_decoded_bytes = 536870912
//!
//! [document]
//! page_width = 1240
//! page_height = 1754
//! quality = 85
//!
//! [progress]
//! ramp_interval_ms = 100
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want.
//!
//! ```toml
//! [search]
//! quality_floor = 30
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in a directory by [`load_raw_config`].
pub const CONFIG_FILE_NAME: &str = "imgpress.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration loaded from `imgpress.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Target-size search bounds.
    pub search: SearchConfig,
    /// Decoder memory ceiling.
    pub decode: DecodeConfig,
    /// PDF page footprint and page image quality.
    pub document: DocumentConfig,
    /// Synthetic progress ramp.
    pub progress: ProgressConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.search;
        if !(1..=100).contains(&s.quality_floor) {
            return Err(ConfigError::Validation(
                "search.quality_floor must be 1-100".into(),
            ));
        }
        if s.initial_quality < s.quality_floor || s.initial_quality > 100 {
            return Err(ConfigError::Validation(
                "search.initial_quality must be between quality_floor and 100".into(),
            ));
        }
        if s.quality_step == 0 {
            return Err(ConfigError::Validation(
                "search.quality_step must be at least 1".into(),
            ));
        }
        if s.min_dimension == 0 {
            return Err(ConfigError::Validation(
                "search.min_dimension must be at least 1".into(),
            ));
        }
        let in_unit = |v: f64| v > 0.0 && v < 1.0;
        if !in_unit(s.aggressive_scale) || !in_unit(s.gentle_scale) {
            return Err(ConfigError::Validation(
                "search scales must be strictly between 0 and 1".into(),
            ));
        }
        if s.aggressive_scale > s.gentle_scale {
            return Err(ConfigError::Validation(
                "search.aggressive_scale must not exceed search.gentle_scale".into(),
            ));
        }
        if s.aggressive_overshoot <= 1.0 {
            return Err(ConfigError::Validation(
                "search.aggressive_overshoot must be greater than 1".into(),
            ));
        }
        if self.decode.max_decoded_bytes == 0 {
            return Err(ConfigError::Validation(
                "decode.max_decoded_bytes must be non-zero".into(),
            ));
        }
        let d = &self.document;
        if d.page_width == 0 || d.page_height == 0 {
            return Err(ConfigError::Validation(
                "document page dimensions must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&d.quality) {
            return Err(ConfigError::Validation(
                "document.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

/// Target-size search bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub initial_quality: u32,
    pub quality_step: u32,
    pub quality_floor: u32,
    pub min_dimension: u32,
    pub max_resize_attempts: u32,
    pub max_iterations: u32,
    pub aggressive_overshoot: f64,
    pub aggressive_scale: f64,
    pub gentle_scale: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_quality: 100,
            quality_step: 10,
            quality_floor: 10,
            min_dimension: 50,
            max_resize_attempts: 20,
            max_iterations: 64,
            aggressive_overshoot: 2.0,
            aggressive_scale: 0.7,
            gentle_scale: 0.9,
        }
    }
}

/// Decoder memory ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeConfig {
    /// Largest RGBA8 buffer a single decode may produce, in bytes.
    pub max_decoded_bytes: u64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_decoded_bytes: crate::imaging::rust_backend::DEFAULT_MAX_DECODED_BYTES,
        }
    }
}

/// PDF assembly settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentConfig {
    /// Page footprint in pixels; each page image is subsampled to cover it.
    pub page_width: u32,
    pub page_height: u32,
    /// JPEG quality of the embedded page images.
    pub quality: u32,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        // A4 at 150 dpi
        Self {
            page_width: 1240,
            page_height: 1754,
            quality: 85,
        }
    }
}

/// Synthetic progress ramp settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    /// Tick interval of the ramp shown during encode.
    pub ramp_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            ramp_interval_ms: 100,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EngineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `imgpress.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no config file exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(None);
    }
    read_toml(&config_path).map(Some)
}

fn read_toml(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EngineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from an explicit file.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file is an error.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let overlay = read_toml(path)?;
    resolve_config(stock_defaults_value()?, Some(overlay))
}

/// Load `imgpress.toml` from `dir` if present, otherwise the stock defaults.
pub fn load_config_from_dir(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let overlay = load_raw_config(dir)?;
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `imgpress.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgpress configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Target-size search
# ---------------------------------------------------------------------------
[search]
# Quality of the first encode. If it already fits the budget, nothing else runs.
initial_quality = 100

# Lossy codecs step quality down by this much per attempt...
quality_step = 10

# ...until this floor. Quality below it is never attempted.
quality_floor = 10

# Resolution reduction stops before either side drops to this many pixels.
min_dimension = 50

# Hard ceilings on resize attempts and on total loop iterations.
max_resize_attempts = 20
max_iterations = 64

# When the output is more than `aggressive_overshoot` times the budget, shrink
# by `aggressive_scale`; otherwise by `gentle_scale`.
aggressive_overshoot = 2.0
aggressive_scale = 0.7
gentle_scale = 0.9

# ---------------------------------------------------------------------------
# Decoding
# ---------------------------------------------------------------------------
[decode]
# Largest decoded raster (width * height * 4 bytes) accepted. 512 MiB.
max_decoded_bytes = 536870912

# ---------------------------------------------------------------------------
# PDF assembly
# ---------------------------------------------------------------------------
[document]
# Page footprint in pixels (A4 at 150 dpi). Page images are decoded at the
# coarsest subsampling that still covers it.
page_width = 1240
page_height = 1754

# JPEG quality of the embedded page images (1-100).
quality = 85

# ---------------------------------------------------------------------------
# Progress
# ---------------------------------------------------------------------------
[progress]
# Tick interval of the synthetic progress ramp shown while encoding.
ramp_interval_ms = 100

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers. Omit for auto (= number of CPU cores).
# Values larger than the core count are clamped down.
# max_processes = 4
"##
}
