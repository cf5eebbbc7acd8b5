//! Fatal run errors, tagged with the stage (and view) that raised them.

use std::fmt;
use std::path::PathBuf;

use dense_prior_io::PlyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aligner::AlignError;
use crate::graph::ViewPair;
use crate::predictor::PredictorError;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configure,
    Select,
    Preprocess,
    Predict,
    Align,
    Fuse,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Select => "select",
            Stage::Preprocess => "preprocess",
            Stage::Predict => "predict",
            Stage::Align => "align",
            Stage::Fuse => "fuse",
            Stage::Load => "load",
        };
        f.write_str(name)
    }
}

/// Errors that abort a run.
///
/// Every variant knows its [`Stage`]; variants tied to a single view also
/// report its index through [`PipelineError::view`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configure: workspace {path} is unusable: {source}")]
    Configuration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("configure: {0}")]
    InvalidConfig(String),
    #[error("select: dataset returned no view at index {index} (len {len})")]
    MissingView { index: usize, len: usize },
    #[error("preprocess: view {view}: {message}")]
    InvalidView { view: usize, message: String },
    #[error(
        "preprocess: view {view}: degenerate crop (half extents {half_width}x{half_height}) \
         of resized {width}x{height} image"
    )]
    DegenerateCrop {
        view: usize,
        width: u32,
        height: u32,
        half_width: u32,
        half_height: u32,
    },
    #[error("predict: need at least 2 views for a pair graph, got {0}")]
    NotEnoughViews(usize),
    #[error("predict: batch {batch} ({pairs} pairs) failed: {source}")]
    Predictor {
        batch: usize,
        pairs: usize,
        #[source]
        source: PredictorError,
    },
    #[error("predict: invalid output for pair {pair}: {message}")]
    PredictorOutput { pair: ViewPair, message: String },
    #[error("align: optimizer failed: {0}")]
    Aligner(#[source] AlignError),
    #[error("align: view {view}: {message}")]
    AlignmentOutput { view: usize, message: String },
    #[error("align: expected {expected} aligned views, got {actual}")]
    AlignmentCount { expected: usize, actual: usize },
    #[error("fuse: expected {expected} aligned views, got {actual}")]
    FusionCount { expected: usize, actual: usize },
    #[error("fuse: view {view}: {message}")]
    FusionInput { view: usize, message: String },
    #[error("fuse: failed to write {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: PlyError,
    },
    #[error("load: failed to read {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: PlyError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Configuration { .. } | PipelineError::InvalidConfig(_) => {
                Stage::Configure
            }
            PipelineError::MissingView { .. } => Stage::Select,
            PipelineError::InvalidView { .. } | PipelineError::DegenerateCrop { .. } => {
                Stage::Preprocess
            }
            PipelineError::NotEnoughViews(_)
            | PipelineError::Predictor { .. }
            | PipelineError::PredictorOutput { .. } => Stage::Predict,
            PipelineError::Aligner(_)
            | PipelineError::AlignmentOutput { .. }
            | PipelineError::AlignmentCount { .. } => Stage::Align,
            PipelineError::FusionCount { .. }
            | PipelineError::FusionInput { .. }
            | PipelineError::ArtifactWrite { .. } => Stage::Fuse,
            PipelineError::ArtifactRead { .. } => Stage::Load,
        }
    }

    /// Index of the offending view, when the error is tied to one.
    pub fn view(&self) -> Option<usize> {
        match self {
            PipelineError::MissingView { index, .. } => Some(*index),
            PipelineError::InvalidView { view, .. }
            | PipelineError::DegenerateCrop { view, .. }
            | PipelineError::AlignmentOutput { view, .. }
            | PipelineError::FusionInput { view, .. } => Some(*view),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_crop_names_stage_and_view() {
        let err = PipelineError::DegenerateCrop {
            view: 3,
            width: 512,
            height: 12,
            half_width: 256,
            half_height: 0,
        };
        assert_eq!(err.stage(), Stage::Preprocess);
        assert_eq!(err.view(), Some(3));
        let msg = err.to_string();
        assert!(msg.starts_with("preprocess: view 3:"), "{msg}");
        assert!(msg.contains("256x0"), "{msg}");
    }

    #[test]
    fn predictor_error_is_fatal_predict_stage() {
        let err = PipelineError::Predictor {
            batch: 2,
            pairs: 16,
            source: PredictorError::ResourceExhausted("out of memory".into()),
        };
        assert_eq!(err.stage(), Stage::Predict);
        assert_eq!(err.view(), None);
        assert!(err.to_string().contains("out of memory"));
    }
}
