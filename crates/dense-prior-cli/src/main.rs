use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dense_prior_core::{ColorImage, Mat4, SourceView, iso3_from_matrix};
use dense_prior_io::load_ply;
use dense_prior_pipeline::{
    DensePriorConfig, complete_symmetric_pairs, preprocess_view, select_input,
};
use log::info;
use serde::{Deserialize, Serialize};

/// Dense prior command-line tools.
#[derive(Debug, Parser)]
#[command(author, version, about = "Dense point-cloud prior tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Select and preprocess views, then print the resulting shapes and intrinsics.
    Plan {
        /// Path to the JSON view manifest.
        #[arg(long)]
        dataset: PathBuf,

        /// Optional path to JSON DensePriorConfig. Defaults are used if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Summarize a fused PLY artifact.
    Inspect {
        #[arg(long)]
        artifact: PathBuf,
    },
}

/// One manifest entry. Relative image paths are resolved against the
/// manifest's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestView {
    image: PathBuf,
    /// Row-major 4x4 world-to-camera transform.
    extrinsics: [[f64; 4]; 4],
    fov_x: f64,
    fov_y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    views: Vec<ManifestView>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlannedView {
    source_index: usize,
    original_shape: [usize; 2],
    true_shape: [usize; 2],
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanReport {
    views: Vec<PlannedView>,
    pairs: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct InspectReport {
    points: usize,
    has_colors: bool,
    bbox_min: Option<[f64; 3]>,
    bbox_max: Option<[f64; 3]>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn load_view(base: &Path, entry: &ManifestView) -> Result<SourceView> {
    let path = base.join(&entry.image);
    let rgb = image::ImageReader::open(&path)
        .with_context(|| format!("opening {}", path.display()))?
        .decode()
        .with_context(|| format!("decoding {}", path.display()))?
        .to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let image = ColorImage::from_rgb8(width, height, rgb.as_raw())?;

    let rows: Vec<f64> = entry.extrinsics.iter().flatten().copied().collect();
    let camera_se3_world = iso3_from_matrix(&Mat4::from_row_slice(&rows))
        .ok_or_else(|| anyhow!("{}: extrinsics are not a rigid transform", path.display()))?;
    Ok(SourceView::new(image, camera_se3_world, entry.fov_x, entry.fov_y)?)
}

fn load_dataset(manifest_path: &Path) -> Result<Vec<SourceView>> {
    let manifest: Manifest = load_json_file(manifest_path)?;
    let base = manifest_path.parent().unwrap_or(Path::new("."));
    let views = manifest
        .views
        .iter()
        .map(|entry| load_view(base, entry))
        .collect::<Result<Vec<_>>>()?;
    info!("loaded {} views from {}", views.len(), manifest_path.display());
    Ok(views)
}

fn run_plan_from_files(dataset_path: &Path, config_path: Option<&Path>) -> Result<String> {
    let config = match config_path {
        Some(path) => load_json_file::<DensePriorConfig>(path)?,
        None => DensePriorConfig::default(),
    };
    config.check()?;

    let dataset = load_dataset(dataset_path)?;
    let input = select_input(&dataset, config.max_images)?;
    let mode = config.resize_mode();

    let mut views = Vec::with_capacity(input.num_views());
    for (i, (source, &source_index)) in input.views.iter().zip(&input.source_indices).enumerate()
    {
        let prepared = preprocess_view(source, i, mode)?;
        let k = prepared.intrinsics;
        views.push(PlannedView {
            source_index,
            original_shape: [source.image.height(), source.image.width()],
            true_shape: prepared.view.true_shape,
            fx: k.fx,
            fy: k.fy,
            cx: k.cx,
            cy: k.cy,
        });
    }
    let pairs = complete_symmetric_pairs(views.len()).len();
    Ok(serde_json::to_string_pretty(&PlanReport { views, pairs })?)
}

fn run_inspect(artifact: &Path) -> Result<String> {
    let cloud = load_ply(artifact)?;
    let bbox = cloud.bounding_box();
    let report = InspectReport {
        points: cloud.len(),
        has_colors: cloud.has_colors(),
        bbox_min: bbox.map(|(lo, _)| [lo.x, lo.y, lo.z]),
        bbox_max: bbox.map(|(_, hi)| [hi.x, hi.y, hi.z]),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Install the stderr logger. `RUST_LOG` overrides `default_filter`.
fn init_logging(default_filter: &str) -> Result<()> {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filters)
        .try_init()?;
    Ok(())
}

fn main() {
    if let Err(err) = init_logging("info") {
        eprintln!("warning: logging disabled: {err}");
    }
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = match &args.command {
        Command::Plan { dataset, config } => run_plan_from_files(dataset, config.as_deref())?,
        Command::Inspect { artifact } => run_inspect(artifact)?,
    };
    println!("{json}");
    Ok(())
}
