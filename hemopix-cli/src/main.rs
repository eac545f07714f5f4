//! hemopix command-line interface.
//!
//! Builds dataset splits, inspects CT files and exports windowed slices.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::uninlined_format_args
)]

use clap::{Args, Parser, Subcommand};
use hemopix_core::{DisplayRange, Rotation, WindowSpec, WindowedTensor};
use hemopix_dataset::{PipelineConfig, SplitBuilder};
use hemopix_io::{read_2d, read_3d};
use ndarray::Axis;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    HemopixIo(#[from] hemopix_io::Error),

    #[error("{0}")]
    Dataset(#[from] hemopix_dataset::Error),

    #[error("Core error: {0}")]
    Core(#[from] hemopix_core::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Usage(String),
}

/// CT windowing and dataset preparation for hemorrhage classification.
#[derive(Parser)]
#[command(name = "hemopix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging (overrides RUST_LOG default)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or load) the RSNA train/validation split
    Split(SplitArgs),

    /// Show information about a DICOM slice or NIfTI volume
    Info {
        /// Input .dcm, .nii or .nii.gz file
        input: PathBuf,
    },

    /// Write one PNG per window channel of a DICOM slice
    Export {
        /// Input DICOM file
        input: PathBuf,

        /// Extra window as CENTER:WIDTH (repeatable)
        #[arg(short, long = "window", value_parser = parse_window)]
        windows: Vec<WindowSpec>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(Args)]
struct SplitArgs {
    /// RSNA dataset root (containing stage_2_train/)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Fraction of slices assigned to validation
    #[arg(long)]
    validation_fraction: Option<f64>,

    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,

    /// Recompute even if a stored split exists
    #[arg(short, long)]
    force: bool,

    /// JSON pipeline configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn parse_window(s: &str) -> std::result::Result<WindowSpec, String> {
    let (center, width) = s
        .split_once(':')
        .ok_or_else(|| format!("expected CENTER:WIDTH, got {s:?}"))?;
    let center: i32 = center
        .trim()
        .parse()
        .map_err(|e| format!("bad window center {center:?}: {e}"))?;
    let width: i32 = width
        .trim()
        .parse()
        .map_err(|e| format!("bad window width {width:?}: {e}"))?;
    WindowSpec::new(center, width).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Split(args) => run_split(args),
        Commands::Info { input } => run_info(&input),
        Commands::Export {
            input,
            windows,
            out_dir,
        } => run_export(&input, &windows, &out_dir),
    }
}

fn run_split(args: SplitArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(root) = args.root {
        config.root = Some(root);
    }
    if let Some(fraction) = args.validation_fraction {
        config.validation_fraction = fraction;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    let root = config
        .root
        .clone()
        .ok_or_else(|| CliError::Usage("no dataset root: pass --root or set it in --config".into()))?;

    let builder = SplitBuilder::new(&root).with_config(config.split_config());
    let record = builder.build(args.force)?;

    println!("Root: {}", root.display());
    println!("Train: {}", record.train_filenames.len());
    println!("Validation: {}", record.validation_filenames.len());
    println!(
        "Validation positives (any): {}",
        record
            .validation_labels
            .rows()
            .into_iter()
            .filter(|row| row.iter().last().is_some_and(|&any| any > 0.0))
            .count()
    );
    for path in builder.store().artifact_paths() {
        println!("  {}", path.display());
    }
    Ok(())
}

fn is_nifti(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

fn value_range<'a>(values: impl IntoIterator<Item = &'a f32>) -> (f32, f32) {
    values
        .into_iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn run_info(input: &Path) -> Result<()> {
    println!("File: {}", input.display());
    if is_nifti(input) {
        let volume = read_3d(input, Rotation::None)?;
        let (x, y, z) = volume.dim();
        let (min, max) = value_range(&volume);
        println!("Format: NIfTI");
        println!("Shape: {} x {} x {} ({} slices)", x, y, z, z);
        println!("Value range: {} - {}", min, max);
    } else {
        let (image, calibration) = read_2d(input)?;
        let (rows, cols) = image.dim();
        let (min, max) = value_range(&image);
        println!("Format: DICOM");
        println!("Shape: {} x {}", rows, cols);
        println!("Stored value range: {} - {}", min, max);
        println!(
            "Window: center {}, width {}",
            calibration.center(),
            calibration.width()
        );
        println!(
            "Rescale: intercept {}, slope {}",
            calibration.intercept(),
            calibration.slope()
        );
    }
    Ok(())
}

fn run_export(input: &Path, windows: &[WindowSpec], out_dir: &Path) -> Result<()> {
    let (raw, calibration) = read_2d(input)?;
    let tensor = WindowedTensor::build_with_range(&raw, &calibration, windows, DisplayRange::BYTE);
    std::fs::create_dir_all(out_dir)?;

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("slice");
    let (rows, cols) = raw.dim();
    for (index, channel) in tensor.as_array().axis_iter(Axis(0)).enumerate() {
        let pixels: Vec<u8> = channel.iter().map(|&v| v.round() as u8).collect();
        let width = u32::try_from(cols).map_err(|_| CliError::Usage("slice too wide".into()))?;
        let height = u32::try_from(rows).map_err(|_| CliError::Usage("slice too tall".into()))?;
        let gray = image::GrayImage::from_raw(width, height, pixels)
            .ok_or_else(|| CliError::Usage(format!("cannot build {}x{} image", cols, rows)))?;

        let path = out_dir.join(format!("{stem}_ch{index}.png"));
        gray.save(&path)?;
        log::info!("wrote {}", path.display());
    }
    println!(
        "Exported {} channel(s) of {} to {}",
        tensor.channels(),
        input.display(),
        out_dir.display()
    );
    Ok(())
}
