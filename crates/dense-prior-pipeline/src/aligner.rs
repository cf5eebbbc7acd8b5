//! Global aligner interface and anchor construction.
//!
//! The optimizer itself is external. The pipeline builds one fixed anchor
//! (pose, focal, principal point) per processed view, hands it together with
//! every pairwise prediction to a [`GlobalAligner`], and receives one dense
//! point map with a confidence mask per view.

use dense_prior_core::{Device, Iso3, Real, Vec2};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PipelineError;
use crate::predictor::PairPrediction;
use crate::preprocess::PreparedView;

/// Learning-rate decay over normalized progress `t` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrSchedule {
    #[default]
    Cosine,
    Linear,
}

impl LrSchedule {
    /// Rate at progress `t`, decaying from `base` at `t = 0` to `min` at `t = 1`.
    pub fn learning_rate(&self, t: Real, base: Real, min: Real) -> Real {
        let t = t.clamp(0.0, 1.0);
        match self {
            LrSchedule::Cosine => {
                min + (base - min) * (1.0 + (t * std::f64::consts::PI).cos()) / 2.0
            }
            LrSchedule::Linear => base + (min - base) * t,
        }
    }
}

/// How the aligner seeds its per-view parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignInit {
    /// Poses, focals, and principal points come from the anchors and stay fixed.
    #[default]
    KnownPoses,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    pub init: AlignInit,
    /// Iteration budget; the aligner may stop earlier on convergence.
    pub max_iters: usize,
    pub schedule: LrSchedule,
    pub lr: Real,
    pub min_lr: Real,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            init: AlignInit::KnownPoses,
            max_iters: 500,
            schedule: LrSchedule::Cosine,
            lr: 0.01,
            min_lr: 1e-6,
        }
    }
}

impl AlignOptions {
    /// Rate at `iteration` out of `max_iters`.
    pub fn learning_rate_at(&self, iteration: usize) -> Real {
        let t = if self.max_iters == 0 {
            1.0
        } else {
            iteration as Real / self.max_iters as Real
        };
        self.schedule.learning_rate(t, self.lr, self.min_lr)
    }
}

/// Fixed per-view constraint handed to the aligner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewAnchor {
    pub view: usize,
    /// Camera-to-world pose.
    pub world_se3_camera: Iso3,
    /// Mean of `fx` and `fy` of the processed view.
    pub focal: Real,
    pub principal_point: Vec2,
    /// `[height, width]` of the processed view.
    pub shape: [usize; 2],
}

/// One anchor per prepared view, in the same order.
pub fn build_anchors(views: &[PreparedView]) -> Vec<ViewAnchor> {
    views
        .iter()
        .map(|p| ViewAnchor {
            view: p.view.index,
            world_se3_camera: p.world_se3_camera,
            focal: p.intrinsics.mean_focal(),
            principal_point: p.intrinsics.principal_point(),
            shape: p.view.true_shape,
        })
        .collect()
}

/// Everything an aligner run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentRequest {
    pub anchors: Vec<ViewAnchor>,
    pub predictions: Vec<PairPrediction>,
    pub options: AlignOptions,
}

/// Aligned geometry of one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewAlignment {
    pub height: usize,
    pub width: usize,
    /// World-frame points, row-major.
    pub points: Vec<[f32; 3]>,
    /// Confidence mask, row-major.
    pub mask: Vec<bool>,
}

impl ViewAlignment {
    pub fn num_confident(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Indexed like the request anchors.
    pub views: Vec<ViewAlignment>,
    pub iterations: usize,
    pub final_loss: Option<Real>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("did not converge: {0}")]
    Diverged(String),
    #[error("{0}")]
    Other(String),
}

/// External global alignment optimizer.
pub trait GlobalAligner {
    /// Reconcile all pairwise predictions into one point map per anchor.
    fn align(
        &mut self,
        request: &AlignmentRequest,
        device: &Device,
    ) -> Result<AlignmentResult, AlignError>;
}

impl<T: GlobalAligner + ?Sized> GlobalAligner for Box<T> {
    fn align(
        &mut self,
        request: &AlignmentRequest,
        device: &Device,
    ) -> Result<AlignmentResult, AlignError> {
        (**self).align(request, device)
    }
}

/// Invoke `aligner` and check its result against the request anchors.
pub fn run_alignment<A: GlobalAligner + ?Sized>(
    aligner: &mut A,
    request: &AlignmentRequest,
    device: &Device,
) -> Result<AlignmentResult, PipelineError> {
    info!(
        "aligning {} views from {} pair predictions ({:?}, {} iterations, lr {})",
        request.anchors.len(),
        request.predictions.len(),
        request.options.init,
        request.options.max_iters,
        request.options.lr
    );
    let result = aligner
        .align(request, device)
        .map_err(PipelineError::Aligner)?;

    if result.views.len() != request.anchors.len() {
        return Err(PipelineError::AlignmentCount {
            expected: request.anchors.len(),
            actual: result.views.len(),
        });
    }
    for (anchor, view) in request.anchors.iter().zip(&result.views) {
        let bad = |message: String| PipelineError::AlignmentOutput {
            view: anchor.view,
            message,
        };
        if [view.height, view.width] != anchor.shape {
            return Err(bad(format!(
                "shape {}x{} does not match processed view {}x{}",
                view.width, view.height, anchor.shape[1], anchor.shape[0]
            )));
        }
        let n = view.height * view.width;
        if view.points.len() != n || view.mask.len() != n {
            return Err(bad(format!(
                "{} points and {} mask entries for {n} pixels",
                view.points.len(),
                view.mask.len()
            )));
        }
    }
    debug!(
        "alignment finished after {} iterations (loss {:?})",
        result.iterations, result.final_loss
    );
    Ok(result)
}
