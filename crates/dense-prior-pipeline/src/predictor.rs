//! Pairwise predictor interface and batched orchestration.
//!
//! The predictor itself is an external collaborator (typically a neural
//! network). This module only defines what it is given, what it must
//! return, and how pairs are chunked into batches.

use std::collections::HashMap;

use dense_prior_core::Device;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::PipelineError;
use crate::graph::ViewPair;
use crate::preprocess::ProcessedView;

/// Pairs per predictor call unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Failure reported by a [`PairPredictor`]. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictorError {
    /// The accelerator ran out of memory or a similar resource.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Per-pixel 3D points and confidences for one view of a pair.
///
/// Both buffers are row-major with `height * width` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointMap {
    pub height: usize,
    pub width: usize,
    pub points: Vec<[f32; 3]>,
    pub confidence: Vec<f32>,
}

impl PointMap {
    /// Check buffer lengths against the declared shape.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.height * self.width;
        if self.points.len() != n {
            return Err(format!(
                "{} points for a {}x{} map",
                self.points.len(),
                self.width,
                self.height
            ));
        }
        if self.confidence.len() != n {
            return Err(format!(
                "{} confidences for a {}x{} map",
                self.confidence.len(),
                self.width,
                self.height
            ));
        }
        Ok(())
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }
}

/// One pair handed to the predictor.
#[derive(Debug, Clone, Copy)]
pub struct PairInput<'a> {
    pub pair: ViewPair,
    pub first: &'a ProcessedView,
    pub second: &'a ProcessedView,
}

/// Predictor output for one ordered pair.
///
/// Both point maps are expressed in the frame of `pair.first`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPrediction {
    pub pair: ViewPair,
    pub first: PointMap,
    pub second: PointMap,
}

/// Dense two-view geometry predictor.
pub trait PairPredictor {
    /// Predict point maps for every pair in `batch`.
    ///
    /// Results may come back in any order but must cover each submitted
    /// pair exactly once.
    fn predict_batch(
        &mut self,
        batch: &[PairInput<'_>],
        device: &Device,
    ) -> Result<Vec<PairPrediction>, PredictorError>;
}

impl<T: PairPredictor + ?Sized> PairPredictor for Box<T> {
    fn predict_batch(
        &mut self,
        batch: &[PairInput<'_>],
        device: &Device,
    ) -> Result<Vec<PairPrediction>, PredictorError> {
        (**self).predict_batch(batch, device)
    }
}

/// Run `predictor` over `pairs` in batches of `batch_size`.
///
/// The returned predictions follow the order of `pairs`. The first predictor
/// error aborts the whole call; nothing is retried.
pub fn predict_pairs<P, V>(
    predictor: &mut P,
    views: &[V],
    pairs: &[ViewPair],
    batch_size: usize,
    device: &Device,
) -> Result<Vec<PairPrediction>, PipelineError>
where
    P: PairPredictor + ?Sized,
    V: AsRef<ProcessedView>,
{
    if batch_size == 0 {
        return Err(PipelineError::InvalidConfig(
            "batch_size must be positive".to_string(),
        ));
    }
    let view = |i: usize, pair: ViewPair| {
        views
            .get(i)
            .map(AsRef::<ProcessedView>::as_ref)
            .ok_or_else(|| PipelineError::PredictorOutput {
                pair,
                message: format!("view {i} out of range ({} views)", views.len()),
            })
    };

    let num_batches = pairs.len().div_ceil(batch_size);
    info!(
        "predicting {} pairs in {num_batches} batches on {device}",
        pairs.len()
    );

    let mut out = Vec::with_capacity(pairs.len());
    for (batch_idx, chunk) in pairs.chunks(batch_size).enumerate() {
        let inputs = chunk
            .iter()
            .map(|&pair| {
                Ok(PairInput {
                    pair,
                    first: view(pair.first, pair)?,
                    second: view(pair.second, pair)?,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let predictions =
            predictor
                .predict_batch(&inputs, device)
                .map_err(|source| PipelineError::Predictor {
                    batch: batch_idx,
                    pairs: chunk.len(),
                    source,
                })?;
        debug!(
            "batch {}/{num_batches}: {} predictions",
            batch_idx + 1,
            predictions.len()
        );
        out.extend(order_batch(&inputs, predictions)?);
    }
    Ok(out)
}

/// Reorder one batch of predictions to match its inputs and check shapes.
fn order_batch(
    inputs: &[PairInput<'_>],
    predictions: Vec<PairPrediction>,
) -> Result<Vec<PairPrediction>, PipelineError> {
    let mut by_pair: HashMap<ViewPair, PairPrediction> = HashMap::with_capacity(predictions.len());
    for p in predictions {
        let pair = p.pair;
        if by_pair.insert(pair, p).is_some() {
            return Err(PipelineError::PredictorOutput {
                pair,
                message: "duplicate prediction".to_string(),
            });
        }
    }
    if by_pair.len() != inputs.len() {
        let extra = by_pair
            .keys()
            .find(|k| !inputs.iter().any(|i| i.pair == **k))
            .copied();
        if let Some(pair) = extra {
            return Err(PipelineError::PredictorOutput {
                pair,
                message: "prediction for a pair that was not submitted".to_string(),
            });
        }
    }

    inputs
        .iter()
        .map(|input| {
            let pred = by_pair
                .remove(&input.pair)
                .ok_or_else(|| PipelineError::PredictorOutput {
                    pair: input.pair,
                    message: "missing prediction".to_string(),
                })?;
            check_map(input.pair, &pred.first, input.first)?;
            check_map(input.pair, &pred.second, input.second)?;
            Ok(pred)
        })
        .collect()
}

fn check_map(pair: ViewPair, map: &PointMap, view: &ProcessedView) -> Result<(), PipelineError> {
    map.validate()
        .map_err(|message| PipelineError::PredictorOutput { pair, message })?;
    if map.shape() != view.true_shape {
        return Err(PipelineError::PredictorOutput {
            pair,
            message: format!(
                "point map shape {:?} does not match view {} shape {:?}",
                map.shape(),
                view.index,
                view.true_shape
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::complete_symmetric_pairs;
    use crate::preprocess::NormalizedImage;

    fn view(index: usize) -> ProcessedView {
        let (h, w) = (2, 3);
        ProcessedView {
            image: NormalizedImage {
                height: h,
                width: w,
                data: vec![0.0; 3 * h * w],
            },
            unnormalized: vec![0; 3 * h * w],
            true_shape: [h, w],
            index,
            instance: index.to_string(),
        }
    }

    fn map(v: &ProcessedView) -> PointMap {
        let n = v.num_pixels();
        PointMap {
            height: v.height(),
            width: v.width(),
            points: vec![[0.0, 0.0, 1.0]; n],
            confidence: vec![1.0; n],
        }
    }

    /// Returns predictions reversed within each batch and records batch sizes.
    #[derive(Default)]
    struct Recording {
        batches: Vec<usize>,
        fail_on: Option<usize>,
    }

    impl PairPredictor for Recording {
        fn predict_batch(
            &mut self,
            batch: &[PairInput<'_>],
            _device: &Device,
        ) -> Result<Vec<PairPrediction>, PredictorError> {
            if self.fail_on == Some(self.batches.len()) {
                return Err(PredictorError::ResourceExhausted("out of memory".into()));
            }
            self.batches.push(batch.len());
            Ok(batch
                .iter()
                .rev()
                .map(|input| PairPrediction {
                    pair: input.pair,
                    first: map(input.first),
                    second: map(input.second),
                })
                .collect())
        }
    }

    #[test]
    fn batches_and_order() {
        let views: Vec<_> = (0..5).map(view).collect();
        let pairs = complete_symmetric_pairs(5);
        let mut predictor = Recording::default();
        let out = predict_pairs(&mut predictor, &views, &pairs, 16, &Device::Cpu).unwrap();
        assert_eq!(predictor.batches, vec![16, 4]);
        let got: Vec<ViewPair> = out.iter().map(|p| p.pair).collect();
        assert_eq!(got, pairs);
    }

    #[test]
    fn error_aborts_remaining_batches() {
        let views: Vec<_> = (0..5).map(view).collect();
        let pairs = complete_symmetric_pairs(5);
        let mut predictor = Recording {
            fail_on: Some(1),
            ..Default::default()
        };
        let err = predict_pairs(&mut predictor, &views, &pairs, 8, &Device::Cuda(0)).unwrap_err();
        assert!(matches!(err, PipelineError::Predictor { batch: 1, pairs: 8, .. }));
        assert_eq!(predictor.batches, vec![8]);
    }

    struct Dropping;

    impl PairPredictor for Dropping {
        fn predict_batch(
            &mut self,
            batch: &[PairInput<'_>],
            _device: &Device,
        ) -> Result<Vec<PairPrediction>, PredictorError> {
            Ok(batch
                .iter()
                .skip(1)
                .map(|input| PairPrediction {
                    pair: input.pair,
                    first: map(input.first),
                    second: map(input.second),
                })
                .collect())
        }
    }

    #[test]
    fn missing_prediction_is_reported() {
        let views: Vec<_> = (0..2).map(view).collect();
        let pairs = complete_symmetric_pairs(2);
        let err = predict_pairs(&mut Dropping, &views, &pairs, 16, &Device::Cpu).unwrap_err();
        match err {
            PipelineError::PredictorOutput { pair, .. } => assert_eq!(pair, ViewPair::new(1, 0)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let views: Vec<_> = (0..2).map(view).collect();
        let err = predict_pairs(&mut Dropping, &views, &[], 0, &Device::Cpu).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn point_map_validation() {
        let mut m = map(&view(0));
        assert!(m.validate().is_ok());
        m.confidence.pop();
        assert!(m.validate().is_err());
    }
}
