//! [`ProblemType`] implementation for dense stereo initialization.

use std::path::{Path, PathBuf};

use anyhow::{Result, ensure};
use dense_prior_core::{CameraDataset, SourceView, select_view_indices};
use dense_prior_io::PlyEncoding;
use log::info;
use serde::{Deserialize, Serialize};

use crate::aligner::AlignOptions;
use crate::error::PipelineError;
use crate::fusion::FusionStats;
use crate::predictor::DEFAULT_BATCH_SIZE;
use crate::preprocess::ResizeMode;
use crate::session::{InvalidationPolicy, ProblemType};

use super::state::DenseInitState;

/// Dense point-cloud prior from calibrated views.
///
/// - **Config**: [`DensePriorConfig`]
/// - **Input**: [`DenseInitInput`], the selected source views
/// - **State**: [`DenseInitState`], per-stage intermediate buffers
/// - **Output**/**Export**: [`DenseInitOutput`], the run report
#[derive(Debug)]
pub struct DenseInitProblem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensePriorConfig {
    /// Directory holding the artifact. `None` creates a temporary directory.
    pub workspace_dir: Option<PathBuf>,
    /// Artifact file name inside the workspace.
    pub artifact_name: String,
    /// Upper bound on the number of views fed to the predictor.
    pub max_images: usize,
    /// Target long edge; 224 switches to square crops.
    pub image_size: u32,
    /// Allow square long-edge output instead of forcing 4:3.
    pub square_ok: bool,
    /// Point budget of the fused cloud.
    pub max_points: usize,
    /// Pairs per predictor call.
    pub batch_size: usize,
    pub align: AlignOptions,
    pub encoding: PlyEncoding,
}

impl Default for DensePriorConfig {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            artifact_name: "fused.ply".to_string(),
            max_images: 20,
            image_size: 512,
            square_ok: false,
            max_points: 500_000,
            batch_size: DEFAULT_BATCH_SIZE,
            align: AlignOptions::default(),
            encoding: PlyEncoding::default(),
        }
    }
}

impl DensePriorConfig {
    pub fn resize_mode(&self) -> ResizeMode {
        ResizeMode::from_image_size(self.image_size, self.square_ok)
    }

    pub fn artifact_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.artifact_name)
    }

    /// Reject configurations no run could complete with.
    pub fn check(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::InvalidConfig(msg));
        if self.max_images == 0 {
            return fail("max_images must be positive".into());
        }
        if self.image_size < 16 {
            return fail(format!("image_size must be at least 16, got {}", self.image_size));
        }
        if self.max_points == 0 {
            return fail("max_points must be positive".into());
        }
        if self.batch_size == 0 {
            return fail("batch_size must be positive".into());
        }
        if !(self.align.lr.is_finite() && self.align.lr > 0.0) {
            return fail(format!("align.lr must be positive, got {}", self.align.lr));
        }
        if !(self.align.min_lr >= 0.0 && self.align.min_lr <= self.align.lr) {
            return fail(format!(
                "align.min_lr must lie in [0, lr], got {}",
                self.align.min_lr
            ));
        }
        let name = Path::new(&self.artifact_name);
        if self.artifact_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return fail(format!(
                "artifact_name must be a plain file name, got {:?}",
                self.artifact_name
            ));
        }
        Ok(())
    }
}

/// Views selected for one run, with their positions in the source dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseInitInput {
    pub views: Vec<SourceView>,
    pub source_indices: Vec<usize>,
}

impl DenseInitInput {
    pub fn num_views(&self) -> usize {
        self.views.len()
    }
}

/// Pick at most `max_images` views from `dataset` and copy them out.
pub fn select_input<D: CameraDataset + ?Sized>(
    dataset: &D,
    max_images: usize,
) -> Result<DenseInitInput, PipelineError> {
    let len = dataset.len();
    let source_indices = select_view_indices(len, max_images);
    if source_indices.len() < len {
        info!(
            "dataset has {len} views, down-sampling to {} (interval {})",
            source_indices.len(),
            len / max_images.max(1)
        );
    }
    let views = source_indices
        .iter()
        .map(|&index| {
            dataset
                .view(index)
                .map(|v| v.into_owned())
                .ok_or(PipelineError::MissingView { index, len })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DenseInitInput {
        views,
        source_indices,
    })
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseInitOutput {
    /// Dataset indices of the views that were processed.
    pub source_indices: Vec<usize>,
    /// `[height, width]` of each processed view.
    pub view_shapes: Vec<[usize; 2]>,
    pub pairs_predicted: usize,
    pub align_iterations: usize,
    pub align_loss: Option<f64>,
    pub fusion: FusionStats,
    pub artifact: PathBuf,
}

impl ProblemType for DenseInitProblem {
    type Config = DensePriorConfig;
    type Input = DenseInitInput;
    type State = DenseInitState;
    type Output = DenseInitOutput;
    type Export = DenseInitOutput;

    fn name() -> &'static str {
        "dense_init"
    }

    fn validate_input(input: &Self::Input) -> Result<()> {
        ensure!(!input.views.is_empty(), "no views selected");
        ensure!(
            input.views.len() == input.source_indices.len(),
            "{} views but {} source indices",
            input.views.len(),
            input.source_indices.len()
        );
        Ok(())
    }

    fn validate_config(config: &Self::Config) -> Result<()> {
        config.check()?;
        Ok(())
    }

    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn on_config_change() -> InvalidationPolicy {
        // Every stage depends on the config.
        InvalidationPolicy::CLEAR_COMPUTED
    }

    fn export(output: &Self::Output, _config: &Self::Config) -> Result<Self::Export> {
        Ok(output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dense_prior_core::{ColorImage, Iso3};

    fn views(n: usize) -> Vec<SourceView> {
        (0..n)
            .map(|i| {
                let img = ColorImage::from_fn(4, 4, |_, _| [i as f32 / n as f32; 3]).unwrap();
                SourceView::new(img, Iso3::translation(i as f64, 0.0, 0.0), 1.0, 1.0).unwrap()
            })
            .collect()
    }

    #[test]
    fn defaults() {
        let config = DensePriorConfig::default();
        assert!(config.workspace_dir.is_none());
        assert_eq!(config.max_images, 20);
        assert_eq!(config.image_size, 512);
        assert_eq!(config.max_points, 500_000);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.align.max_iters, 500);
        assert!(config.check().is_ok());
        assert_eq!(
            config.artifact_path(Path::new("/tmp/ws")),
            PathBuf::from("/tmp/ws/fused.ply")
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: DensePriorConfig =
            serde_json::from_str(r#"{"image_size": 224, "align": {"max_iters": 100}}"#).unwrap();
        assert_eq!(config.resize_mode(), ResizeMode::SquareCrop { size: 224 });
        assert_eq!(config.align.max_iters, 100);
        assert_eq!(config.max_points, 500_000);
    }

    #[test]
    fn invalid_configs() {
        let bad = [
            DensePriorConfig {
                max_images: 0,
                ..Default::default()
            },
            DensePriorConfig {
                image_size: 8,
                ..Default::default()
            },
            DensePriorConfig {
                artifact_name: "../escape.ply".into(),
                ..Default::default()
            },
            DensePriorConfig {
                align: AlignOptions {
                    lr: 0.0,
                    ..Default::default()
                },
                ..Default::default()
            },
        ];
        for config in bad {
            let err = DenseInitProblem::validate_config(&config).unwrap_err();
            let typed = err.downcast_ref::<PipelineError>().unwrap();
            assert!(matches!(typed, PipelineError::InvalidConfig(_)));
        }
    }

    #[test]
    fn select_input_keeps_dataset_indices() {
        let dataset = views(45);
        let input = select_input(&dataset, 20).unwrap();
        assert_eq!(input.num_views(), 20);
        assert_eq!(input.source_indices[3], 6);
        assert_eq!(input.views[3].camera_se3_world.translation.vector.x, 6.0);
    }

    #[test]
    fn input_validation() {
        assert!(DenseInitProblem::validate_input(&select_input(&views(3), 20).unwrap()).is_ok());
        let empty = DenseInitInput {
            views: Vec::new(),
            source_indices: Vec::new(),
        };
        assert!(DenseInitProblem::validate_input(&empty).is_err());
    }
}
