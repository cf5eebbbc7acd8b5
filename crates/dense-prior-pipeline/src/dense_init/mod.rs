//! Dense stereo initialization of a point-cloud prior.
//!
//! ```no_run
//! use dense_prior_core::Device;
//! use dense_prior_pipeline::dense_init::{DenseInitProblem, run_dense_init, select_input};
//! use dense_prior_pipeline::session::PriorSession;
//! # fn main() -> anyhow::Result<()> {
//! # let dataset: Vec<dense_prior_core::SourceView> = unimplemented!();
//! # let mut predictor: Box<dyn dense_prior_pipeline::predictor::PairPredictor> = unimplemented!();
//! # let mut aligner: Box<dyn dense_prior_pipeline::aligner::GlobalAligner> = unimplemented!();
//! let mut session = PriorSession::<DenseInitProblem>::new();
//! session.set_input(select_input(&dataset, session.config.max_images)?)?;
//!
//! let artifact = std::path::Path::new("workspace/fused.ply");
//! run_dense_init(&mut session, &mut predictor, &mut aligner, &Device::Cuda(0), artifact)?;
//!
//! let report = session.export()?;
//! println!("{} points", report.fusion.kept_points);
//! # Ok(())
//! # }
//! ```

mod problem;
mod state;
mod steps;

pub use problem::{
    DenseInitInput, DenseInitOutput, DenseInitProblem, DensePriorConfig, select_input,
};
pub use state::DenseInitState;
pub use steps::{run_dense_init, step_align, step_fuse, step_predict, step_preprocess};
