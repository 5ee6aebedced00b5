use clap::{Parser, Subcommand};
use imgpress::config;
use imgpress::history::{HistoryEntry, append_history};
use imgpress::imaging::format::mime_from_extension;
use imgpress::imaging::{
    Codec, ColorAdjustmentSpec, FilterPreset, ImageBackend, Quality, ResizeSpec, RustBackend,
    TargetFormat, resolve_format,
};
use imgpress::progress::{CancellationToken, Progress};
use imgpress::types::{ConversionRequest, ImageSource};
use imgpress::{batch, convert, document, output};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Bytes read from each input to sniff its type before naming the output.
const HEADER_LEN: u64 = 512;

#[derive(Parser)]
#[command(name = "imgpress")]
#[command(about = "Convert and compress images, optionally to a byte budget")]
#[command(long_about = "\
Convert and compress images, optionally to a byte budget

With --max-bytes, quality is lowered step by step and then resolution is
reduced until the output fits. If the budget cannot be reached, the
last output produced is still written and reported as over budget.

Format 'original' keeps the source format where an encoder exists
(PNG, WebP, BMP) and falls back to JPEG otherwise. HEIF output has no
encoder and always falls back to JPEG.

Run 'imgpress gen-config' to print a documented imgpress.toml.")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (default: ./imgpress.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ConvertArgs {
    /// Image files or directories (walked recursively)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, short = 'o')]
    output_dir: PathBuf,

    /// original, jpeg, png, webp, bmp, heif or avif
    #[arg(long, default_value = "original")]
    format: TargetFormat,

    /// Quality for lossy output when no budget is set (1-100)
    #[arg(long, default_value_t = 90)]
    quality: u32,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Force the exact --width/--height instead of fitting inside them
    #[arg(long)]
    stretch: bool,

    /// Target maximum output size in bytes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    max_bytes: Option<u64>,

    /// Copy orientation, capture time, camera, GPS and exposure tags
    #[arg(long)]
    keep_metadata: bool,

    /// Clockwise rotation in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rotate: f64,

    #[arg(long, allow_negative_numbers = true)]
    brightness: Option<f32>,
    #[arg(long)]
    contrast: Option<f32>,
    #[arg(long)]
    saturation: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    hue: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    temperature: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    tint: Option<f32>,

    /// grayscale, sepia or invert, applied after the other adjustments
    #[arg(long)]
    filter: Option<FilterPreset>,

    /// Append one JSON line per converted file
    #[arg(long)]
    history_log: Option<PathBuf>,
}

#[derive(clap::Args)]
struct PdfArgs {
    /// Image files or directories, one page each, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(long, short = 'o')]
    output: PathBuf,

    /// Page footprint width in pixels
    #[arg(long)]
    page_width: Option<u32>,

    /// Page footprint height in pixels
    #[arg(long)]
    page_height: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Convert images, optionally to a byte budget
    Convert(ConvertArgs),
    /// Combine images into a multi-page PDF
    Pdf(PdfArgs),
    /// Show header facts without decoding
    Probe { input: PathBuf },
    /// Print a stock imgpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        other => other,
    };

    let config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_config_from_dir(Path::new("."))?,
    };
    let backend = RustBackend::with_memory_ceiling(config.decode.max_decoded_bytes);

    match command {
        Command::Convert(args) => {
            init_thread_pool(&config.processing);
            let requests = build_requests(&args, &backend)?;

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = batch::convert_batch(
                &backend,
                &requests,
                &config,
                &CancellationToken::new(),
                Some(tx),
            );
            printer.join().map_err(|_| "output thread panicked")?;

            if let Some(log) = &args.history_log {
                let entries: Vec<HistoryEntry> = report
                    .outputs()
                    .map(|(item, summary)| HistoryEntry::from_summary(summary, &item.label))
                    .collect();
                append_history(log, &entries)?;
            }

            let summary = report.summary();
            output::print_batch_summary(&summary);
            if !summary.any_converted() {
                return Err("no image converted".into());
            }
        }
        Command::Pdf(args) => {
            let mut doc_config = config.document.clone();
            if let Some(w) = args.page_width {
                doc_config.page_width = w;
            }
            if let Some(h) = args.page_height {
                doc_config.page_height = h;
            }
            let sources: Vec<ImageSource> = collect_inputs(&args.inputs)?
                .into_iter()
                .map(|(path, _)| ImageSource::from_path(path))
                .collect();
            let doc = document::write_pdf(
                &backend,
                &sources,
                &doc_config,
                &Progress::silent(),
                &args.output,
            )?;
            output::print_document(&doc, &args.output);
        }
        Command::Probe { input } => {
            let report = convert::probe_source(&backend, &ImageSource::from_path(input))?;
            output::print_probe(&report);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Expand the inputs into `(file, path relative to its input root)` pairs.
///
/// Files are taken as given. Directories are walked in file-name order and
/// only files with a known image extension are kept.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<(PathBuf, PathBuf)>, walkdir::Error> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            let name = input.file_name().map(PathBuf::from).unwrap_or_default();
            files.push((input.clone(), name));
            continue;
        }
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type().is_file() || mime_from_extension(path).is_none() {
                continue;
            }
            let relative = path.strip_prefix(input).unwrap_or(path).to_path_buf();
            files.push((path.to_path_buf(), relative));
        }
    }
    Ok(files)
}

/// One request per input file.
///
/// The output codec is resolved here so the file name carries the extension
/// of what is actually written. Inputs that would land on the same output
/// path are rejected before anything is converted.
fn build_requests(
    args: &ConvertArgs,
    backend: &impl ImageBackend,
) -> Result<Vec<ConversionRequest>, Box<dyn std::error::Error>> {
    let files = collect_inputs(&args.inputs)?;
    if files.is_empty() {
        return Err("no images found in the given inputs".into());
    }

    let adjustments = color_adjustments(args);
    let resize = ResizeSpec {
        width: args.width,
        height: args.height,
        maintain_aspect: !args.stretch,
    };

    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut requests = Vec::with_capacity(files.len());
    for (path, relative) in files {
        let source = ImageSource::from_path(&path);
        let codec = output_codec(&source, args.format, backend);
        let destination = args.output_dir.join(relative).with_extension(codec.extension());
        if let Some(earlier) = claimed.insert(destination.clone(), path.clone()) {
            return Err(format!(
                "{} and {} would both be written to {}",
                earlier.display(),
                path.display(),
                destination.display()
            )
            .into());
        }

        let mut request = ConversionRequest::new(source);
        request.destination = Some(destination);
        request.target_format = TargetFormat::from(codec);
        request.quality = Quality::new(args.quality);
        request.resize = resize;
        request.target_byte_budget = args.max_bytes;
        request.keep_metadata = args.keep_metadata;
        request.rotation_degrees = args.rotate;
        request.adjustments = adjustments;
        requests.push(request);
    }
    Ok(requests)
}

/// The codec `source` will be written as, falling back to JPEG up front
/// when the backend has no encoder for the resolved one.
fn output_codec(source: &ImageSource, format: TargetFormat, backend: &impl ImageBackend) -> Codec {
    // An unreadable input still gets a name; its conversion fails later.
    let header = source.path().and_then(|p| read_header(p).ok()).unwrap_or_default();
    let codec = resolve_format(format, source.declared_mime(&header).as_deref());
    if backend.can_encode(codec) {
        codec
    } else {
        Codec::DEFAULT
    }
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::new();
    File::open(path)?.take(HEADER_LEN).read_to_end(&mut header)?;
    Ok(header)
}

fn color_adjustments(args: &ConvertArgs) -> Option<ColorAdjustmentSpec> {
    let neutral = ColorAdjustmentSpec::default();
    let spec = ColorAdjustmentSpec {
        brightness: args.brightness.unwrap_or(neutral.brightness),
        contrast: args.contrast.unwrap_or(neutral.contrast),
        saturation: args.saturation.unwrap_or(neutral.saturation),
        hue: args.hue.unwrap_or(neutral.hue),
        temperature: args.temperature.unwrap_or(neutral.temperature),
        tint: args.tint.unwrap_or(neutral.tint),
        filter: args.filter.map(FilterPreset::matrix),
    };
    (!spec.is_neutral()).then_some(spec)
}
