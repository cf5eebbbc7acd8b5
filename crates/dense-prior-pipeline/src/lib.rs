//! Dense point-cloud prior pipeline.
//!
//! Turns a set of calibrated views into one fused, density-capped point
//! cloud: views are selected, resampled with matching intrinsics, paired
//! over a complete symmetric graph, run through an external pairwise
//! predictor, aligned by an external global optimizer anchored on the known
//! poses, and fused into a PLY artifact.
//!
//! ## Entry point
//!
//! ```no_run
//! use dense_prior_core::{Device, SourceView};
//! use dense_prior_pipeline::{
//!     Collaborators, DensePriorConfig, DenseStereoInitializer, PointPrior, initialize_model,
//! };
//! # fn main() -> anyhow::Result<()> {
//! # let dataset: Vec<SourceView> = unimplemented!();
//! # let collaborators: Collaborators = unimplemented!();
//! let config = DensePriorConfig {
//!     workspace_dir: Some("scene/workspace".into()),
//!     ..Default::default()
//! };
//! let mut init = DenseStereoInitializer::new(config, collaborators)?;
//! let model = initialize_model(&mut init, PointPrior::default(), &dataset, false)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Session API
//!
//! The stages are also available as step functions over a
//! [`PriorSession`], see [`dense_init`].

pub mod aligner;
pub mod dense_init;
pub mod error;
pub mod fusion;
pub mod graph;
pub mod initializer;
pub mod predictor;
pub mod preprocess;
pub mod session;

pub use crate::session::{
    ExportRecord, InvalidationPolicy, LogEntry, PriorSession, ProblemType, SessionMetadata,
};

pub use crate::dense_init::{
    DenseInitInput, DenseInitOutput, DenseInitProblem, DenseInitState, DensePriorConfig,
    run_dense_init, select_input, step_align, step_fuse, step_predict, step_preprocess,
};

pub use crate::aligner::{
    AlignError, AlignInit, AlignOptions, AlignmentRequest, AlignmentResult, GlobalAligner,
    LrSchedule, ViewAlignment, ViewAnchor, build_anchors, run_alignment,
};
pub use crate::error::{PipelineError, Stage};
pub use crate::fusion::{FusionStats, cap_density, fuse_views};
pub use crate::graph::{ViewPair, complete_symmetric_pairs};
pub use crate::initializer::{
    Collaborators, DenseStereoInitializer, InitializerFactory, InitializerRegistry,
    PlyFileInitializer, PlyFileOptions, PointCloudInitializer, PointPrior, SceneModel,
    initialize_model, resolve_workspace,
};
pub use crate::predictor::{
    PairInput, PairPrediction, PairPredictor, PointMap, PredictorError, predict_pairs,
};
pub use crate::preprocess::{
    CropPlan, NormalizedImage, PreparedView, ProcessedView, ResizeMode, plan_crop,
    preprocess_view, resized_dims,
};
