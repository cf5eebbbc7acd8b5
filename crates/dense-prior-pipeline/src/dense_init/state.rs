//! Intermediate buffers of a dense initialization run.

use serde::{Deserialize, Serialize};

use crate::aligner::AlignmentResult;
use crate::graph::ViewPair;
use crate::predictor::PairPrediction;
use crate::preprocess::PreparedView;

/// Per-stage results, each consumed by the next stage.
///
/// Predictions are dropped once alignment has run, and the prepared views
/// and alignment once the cloud is fused, so a finished session only keeps
/// its report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DenseInitState {
    /// One entry per selected view, index-aligned with the input.
    pub prepared: Option<Vec<PreparedView>>,
    pub pairs: Option<Vec<ViewPair>>,
    /// Ordered like `pairs`.
    pub predictions: Option<Vec<PairPrediction>>,
    pub alignment: Option<AlignmentResult>,
    // Counters kept after the buffers above are released.
    pub pairs_predicted: usize,
    pub align_iterations: usize,
    pub align_loss: Option<f64>,
}

impl DenseInitState {
    pub fn is_preprocessed(&self) -> bool {
        self.prepared.is_some()
    }

    pub fn is_predicted(&self) -> bool {
        self.predictions.is_some()
    }

    pub fn is_aligned(&self) -> bool {
        self.alignment.is_some()
    }

    /// Drop everything derived from the prepared views.
    pub fn clear_downstream(&mut self) {
        self.pairs = None;
        self.predictions = None;
        self.alignment = None;
        self.pairs_predicted = 0;
        self.align_iterations = 0;
        self.align_loss = None;
    }
}
