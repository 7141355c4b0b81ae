//! microtome: batch CLI for tissue segmentation and patch sampling.
//!
//! Walks a directory of slide rasters, segments the tissue foreground
//! of each, samples a labeled patch grid inside the retained regions,
//! and writes per-slide artifacts under the save directory:
//!
//! - `mask/<slide>.png` -- the segmentation inspection overlay
//! - `patches/<slide>.json` -- flat coordinate/label dataset
//!
//! Disease labels come from ASAP-style annotation XML looked up by
//! slide stem under `--annotation-dir`; slides without an annotation
//! file are processed unlabeled. A failing slide is logged and skipped
//! so one corrupt file cannot sink a batch.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin microtome -- [OPTIONS] <WSI_DIR> --save-dir <DIR>
//! ```

#![allow(clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use microtome_io::{RasterPyramid, StoredDataset};
use microtome_pipeline::{
    ContainmentRuleKind, SampleConfig, SegmentConfig, ThresholdPolicy, extract_patches,
};

/// Batch tissue segmentation and labeled patch sampling.
///
/// Processes every slide raster in a directory, pairing each with an
/// optional annotation file, and writes overlay masks and patch
/// datasets under the save directory.
#[derive(Parser)]
#[command(name = "microtome", version)]
struct Cli {
    /// Directory of slide rasters (PNG, JPEG, BMP, TIFF).
    wsi_dir: PathBuf,

    /// Directory of ASAP-style annotation XML, matched by slide stem.
    #[arg(long)]
    annotation_dir: Option<PathBuf>,

    /// Output directory; `mask/` and `patches/` are created inside it.
    #[arg(long)]
    save_dir: PathBuf,

    /// Pyramid level the segmentation runs at.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_LEVEL)]
    segment_level: usize,

    /// Fixed saturation threshold (ignored with --otsu).
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_THRESHOLD)]
    threshold: u8,

    /// Pick the threshold with Otsu's method instead of a fixed level.
    #[arg(long)]
    otsu: bool,

    /// Minimum tissue area in level-0 pixels.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_MIN_TISSUE_AREA)]
    min_tissue_area: f64,

    /// Minimum hole area in level-0 pixels.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_MIN_HOLE_AREA)]
    min_hole_area: f64,

    /// Holes kept per tissue region (largest first).
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_MAX_HOLES)]
    max_holes: usize,

    /// Median blur radius at the segmentation level.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_MEDIAN_RADIUS)]
    median_radius: u32,

    /// Morphological closing radius at the segmentation level.
    #[arg(long, default_value_t = SegmentConfig::DEFAULT_CLOSE_RADIUS)]
    close_radius: u8,

    /// Pyramid level the patch geometry is expressed at.
    #[arg(long, default_value_t = SampleConfig::DEFAULT_PATCH_LEVEL)]
    patch_level: usize,

    /// Patch edge length at the patch level.
    #[arg(long, default_value_t = SampleConfig::DEFAULT_PATCH_EDGE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    patch_size: u32,

    /// Grid step at the patch level.
    #[arg(long, default_value_t = SampleConfig::DEFAULT_PATCH_EDGE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    step_size: u32,

    /// Containment rule deciding which grid anchors are kept.
    #[arg(long, value_enum, default_value_t = Rule::AnyOfFive)]
    rule: Rule,

    /// Corner inset for the multi-point rules, as a fraction of the
    /// half patch (0.0-1.0).
    #[arg(long, default_value_t = SampleConfig::DEFAULT_CORNER_SHIFT)]
    corner_shift: f64,

    /// Worker threads for candidate evaluation (0 = sequential).
    #[arg(long, default_value_t = SampleConfig::DEFAULT_WORKERS)]
    workers: usize,

    /// Log level filter (error, warn, info, debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Containment rule selection.
#[derive(Clone, Copy, ValueEnum)]
enum Rule {
    /// Keep anchors whose top-left corner lies in the contour.
    LeftTop,
    /// Keep anchors whose patch center lies in the contour.
    Center,
    /// Keep anchors with any of the four inset corners or the center
    /// in the contour.
    AnyOfFive,
    /// Keep anchors with all four inset corners in the contour.
    AllFour,
}

const fn rule_to_pipeline(rule: Rule) -> ContainmentRuleKind {
    match rule {
        Rule::LeftTop => ContainmentRuleKind::LeftTop,
        Rule::Center => ContainmentRuleKind::Center,
        Rule::AnyOfFive => ContainmentRuleKind::AnyOfFive,
        Rule::AllFour => ContainmentRuleKind::AllFour,
    }
}

fn configs_from_cli(cli: &Cli) -> (SegmentConfig, SampleConfig) {
    let segment = SegmentConfig {
        level: cli.segment_level,
        threshold: if cli.otsu {
            ThresholdPolicy::Otsu
        } else {
            ThresholdPolicy::Fixed(cli.threshold)
        },
        min_tissue_area: cli.min_tissue_area,
        min_hole_area: cli.min_hole_area,
        max_holes_per_tissue: cli.max_holes,
        median_radius: cli.median_radius,
        close_radius: cli.close_radius,
    };
    let sample = SampleConfig {
        patch_level: cli.patch_level,
        patch_size: (cli.patch_size, cli.patch_size),
        step_size: (cli.step_size, cli.step_size),
        rule: rule_to_pipeline(cli.rule),
        corner_shift: cli.corner_shift,
        workers: cli.workers,
    };
    (segment, sample)
}

/// Raster extensions treated as slides when scanning the input
/// directory.
const SLIDE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

fn collect_slides(wsi_dir: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = std::fs::read_dir(wsi_dir)
        .map_err(|e| format!("cannot read slide directory {}: {e}", wsi_dir.display()))?;
    let mut slides: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    SLIDE_EXTENSIONS
                        .iter()
                        .any(|known| ext.eq_ignore_ascii_case(known))
                })
        })
        .collect();
    slides.sort();
    Ok(slides)
}

/// Process one slide end to end: open, annotate, extract, persist.
fn process_slide(
    slide_path: &Path,
    cli: &Cli,
    segment: &SegmentConfig,
    sample: &SampleConfig,
) -> Result<usize, String> {
    let stem = slide_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("unusable slide file name: {}", slide_path.display()))?;

    let pyramid = RasterPyramid::open(slide_path)
        .map_err(|e| format!("cannot open {}: {e}", slide_path.display()))?;

    let disease = match &cli.annotation_dir {
        Some(dir) => {
            let annotation_path = dir.join(format!("{stem}.xml"));
            if annotation_path.is_file() {
                Some(microtome_io::load_contours(&annotation_path).map_err(|e| {
                    format!("cannot load annotation {}: {e}", annotation_path.display())
                })?)
            } else {
                log::warn!("{stem}: no annotation at {}", annotation_path.display());
                None
            }
        }
        None => None,
    };

    let result = extract_patches(&pyramid, disease.as_deref(), segment, sample)
        .map_err(|e| format!("extraction failed for {stem}: {e}"))?;

    let mask_path = cli.save_dir.join("mask").join(format!("{stem}.png"));
    result
        .overlay
        .save(&mask_path)
        .map_err(|e| format!("cannot write overlay {}: {e}", mask_path.display()))?;

    let dataset_path = cli.save_dir.join("patches").join(format!("{stem}.json"));
    let stored = StoredDataset::new(&result.dataset, sample.patch_level, sample.patch_size);
    let records = stored.coordinates.len();
    microtome_io::write_dataset(&dataset_path, &stored)
        .map_err(|e| format!("cannot write dataset {}: {e}", dataset_path.display()))?;

    for (region_id, region_records) in result.dataset.regions() {
        log::debug!("{stem}: region {region_id}: {} record(s)", region_records.len());
    }
    log::info!(
        "{stem}: {} region(s), {records} patch record(s)",
        result.regions.len(),
    );
    Ok(records)
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let (segment, sample) = configs_from_cli(cli);

    let slides = collect_slides(&cli.wsi_dir)?;
    if slides.is_empty() {
        return Err(format!("no slide rasters in {}", cli.wsi_dir.display()));
    }

    for subdir in ["mask", "patches"] {
        let dir = cli.save_dir.join(subdir);
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;
    }

    let total = slides.len();
    let mut failures = 0_usize;
    for (index, slide_path) in slides.iter().enumerate() {
        log::info!("slide {}/{total}: {}", index + 1, slide_path.display());
        if let Err(message) = process_slide(slide_path, cli, &segment, &sample) {
            log::error!("{message}");
            failures += 1;
        }
    }

    if failures > 0 {
        log::warn!("{failures}/{total} slide(s) failed");
        return Ok(ExitCode::FAILURE);
    }
    log::info!("processed {total} slide(s)");
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The handle must outlive `run`: dropping it shuts the logger down.
    let _logger = match flexi_logger::Logger::try_with_env_or_str(&cli.log_level)
        .and_then(flexi_logger::Logger::start)
    {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("logger initialization failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&cli) {
        Ok(code) => code,
        Err(message) => {
            log::error!("{message}");
            ExitCode::FAILURE
        }
    }
}
