#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use dense_prior_core::{ColorImage, Device, Iso3, SourceView};
use dense_prior_pipeline::{
    AlignError, AlignmentRequest, AlignmentResult, Collaborators, DensePriorConfig,
    GlobalAligner, PairInput, PairPrediction, PairPredictor, PointMap, PredictorError,
    ProcessedView, ViewAlignment,
};
use nalgebra::{Rotation3, Translation3, Vector3};

/// Views on a circle around the origin, all looking inward.
pub fn ring_dataset(n: usize, width: usize, height: usize) -> Vec<SourceView> {
    (0..n)
        .map(|i| {
            let angle = i as f64 * std::f64::consts::TAU / n as f64;
            let world_se3_camera = Iso3::from_parts(
                Translation3::new(3.0 * angle.sin(), 0.0, -3.0 * angle.cos()),
                Rotation3::from_euler_angles(0.0, -angle, 0.0).into(),
            );
            let image = ColorImage::from_fn(width, height, |x, y| {
                [
                    x as f32 / width as f32,
                    y as f32 / height as f32,
                    i as f32 / n as f32,
                ]
            })
            .unwrap();
            SourceView::new(image, world_se3_camera.inverse(), 1.0, 0.8).unwrap()
        })
        .collect()
}

/// Small config: 64x48 inputs become 32x16 crops (512 pixels per view).
pub fn small_config() -> DensePriorConfig {
    DensePriorConfig {
        image_size: 32,
        ..Default::default()
    }
}

pub const PIXELS_PER_VIEW: usize = 32 * 16;

fn flat_map(view: &ProcessedView, depth: f32) -> PointMap {
    let (h, w) = (view.height(), view.width());
    PointMap {
        height: h,
        width: w,
        points: (0..h * w)
            .map(|i| [(i % w) as f32, (i / w) as f32, depth])
            .collect(),
        confidence: vec![1.0; h * w],
    }
}

/// Returns a fronto-parallel plane for every pair and counts batches.
#[derive(Clone, Default)]
pub struct PlanePredictor {
    pub calls: Rc<Cell<usize>>,
    /// Fail with an out-of-memory error on this call number (0-based).
    pub fail_on_call: Option<usize>,
}

impl PairPredictor for PlanePredictor {
    fn predict_batch(
        &mut self,
        batch: &[PairInput<'_>],
        _device: &Device,
    ) -> Result<Vec<PairPrediction>, PredictorError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on_call == Some(call) {
            return Err(PredictorError::ResourceExhausted(
                "CUDA out of memory".to_string(),
            ));
        }
        Ok(batch
            .iter()
            .map(|input| PairPrediction {
                pair: input.pair,
                first: flat_map(input.first, 1.0),
                second: flat_map(input.second, 1.0),
            })
            .collect())
    }
}

/// Back-projects every pixel of each anchor at a fixed depth.
#[derive(Clone, Default)]
pub struct BackprojectAligner {
    pub calls: Rc<Cell<usize>>,
    /// Views whose mask is all false.
    pub empty_views: Vec<usize>,
    /// Report divergence on this call number (0-based).
    pub fail_on_call: Option<usize>,
}

impl GlobalAligner for BackprojectAligner {
    fn align(
        &mut self,
        request: &AlignmentRequest,
        _device: &Device,
    ) -> Result<AlignmentResult, AlignError> {
        let call = self.calls.get();
        self.calls.set(call + 1);
        if self.fail_on_call == Some(call) {
            return Err(AlignError::Diverged("loss is NaN".to_string()));
        }
        // Each run lands at a different depth, so rewritten artifacts differ.
        let depth = 2.0 + call as f64;
        let views = request
            .anchors
            .iter()
            .map(|anchor| {
                let [h, w] = anchor.shape;
                let points = (0..h * w)
                    .map(|i| {
                        let u = (i % w) as f64;
                        let v = (i / w) as f64;
                        let ray = Vector3::new(
                            (u - anchor.principal_point.x) / anchor.focal,
                            (v - anchor.principal_point.y) / anchor.focal,
                            1.0,
                        );
                        let p = anchor.world_se3_camera * nalgebra::Point3::from(ray * depth);
                        [p.x as f32, p.y as f32, p.z as f32]
                    })
                    .collect();
                let keep = !self.empty_views.contains(&anchor.view);
                ViewAlignment {
                    height: h,
                    width: w,
                    points,
                    mask: vec![keep; h * w],
                }
            })
            .collect();
        Ok(AlignmentResult {
            views,
            iterations: request.options.max_iters.min(10),
            final_loss: Some(0.0),
        })
    }
}

pub fn collaborators(predictor: PlanePredictor, aligner: BackprojectAligner) -> Collaborators {
    Collaborators {
        predictor: Box::new(predictor),
        aligner: Box::new(aligner),
        device: Device::Cuda(0),
    }
}
