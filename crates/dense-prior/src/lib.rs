//! High-level entry crate for dense point-cloud priors.
//!
//! Builds an initial point cloud for a scene representation from a handful
//! of calibrated images, using an external pairwise geometry predictor and
//! an external global aligner.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # let dataset: Vec<dense_prior::core::SourceView> = unimplemented!();
//! # let collaborators: dense_prior::initializer::Collaborators = unimplemented!();
//! use dense_prior::prelude::*;
//!
//! let registry = InitializerRegistry::with_defaults();
//! let options = serde_json::json!({ "workspace_dir": "scene/workspace" });
//! let mut init = registry.create("dense_stereo", &options, Some(collaborators))?;
//! let model = initialize_model(init.as_mut(), PointPrior::default(), &dataset, false)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`session`]: session framework (`PriorSession`, `ProblemType`)
//! - [`dense_init`]: dense stereo problem, config, and step functions
//! - [`initializer`]: cached entry operation and the strategy registry
//! - [`core`]: views, intrinsics, point clouds
//! - [`io`]: PLY reading and atomic writing
//!
//! # Steps
//!
//! | Step | Stage | Consumes | Produces |
//! |------|-------|----------|----------|
//! | `step_preprocess` | preprocess | selected views | prepared views |
//! | `step_predict` | predict | prepared views | pair predictions |
//! | `step_align` | align | predictions + anchors | per-view point maps |
//! | `step_fuse` | fuse | point maps + colors | PLY artifact, report |

/// Session framework shared by pipeline problems.
pub mod session {
    pub use dense_prior_pipeline::session::{
        ExportRecord, InvalidationPolicy, LogEntry, PriorSession, ProblemType, SessionMetadata,
    };
}

/// Dense stereo initialization problem.
///
/// # Example
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// # let dataset: Vec<dense_prior::core::SourceView> = unimplemented!();
/// # let mut predictor: Box<dyn dense_prior::PairPredictor> = unimplemented!();
/// # let mut aligner: Box<dyn dense_prior::GlobalAligner> = unimplemented!();
/// use dense_prior::prelude::*;
/// use dense_prior::dense_init::{run_dense_init, select_input};
///
/// let mut session = PriorSession::<DenseInitProblem>::new();
/// session.set_input(select_input(&dataset, 20)?)?;
/// run_dense_init(&mut session, &mut predictor, &mut aligner, &Device::Cpu, "fused.ply".as_ref())?;
/// let report = session.export()?;
/// # Ok(())
/// # }
/// ```
pub mod dense_init {
    pub use dense_prior_pipeline::dense_init::{
        DenseInitInput, DenseInitOutput, DenseInitProblem, DenseInitState, DensePriorConfig,
        run_dense_init, select_input, step_align, step_fuse, step_predict, step_preprocess,
    };
}

/// Scene initializers and the strategy registry.
pub mod initializer {
    pub use dense_prior_pipeline::initializer::{
        Collaborators, DenseStereoInitializer, InitializerFactory, InitializerRegistry,
        PlyFileInitializer, PlyFileOptions, PointCloudInitializer, PointPrior, SceneModel,
        initialize_model, resolve_workspace,
    };
}

/// Views, intrinsics, point clouds, and math aliases.
pub mod core {
    pub use dense_prior_core::*;
}

/// PLY point-cloud files.
pub mod io {
    pub use dense_prior_io::*;
}

/// Lower-level pipeline stages.
pub mod stages {
    pub use dense_prior_pipeline::aligner;
    pub use dense_prior_pipeline::fusion;
    pub use dense_prior_pipeline::graph;
    pub use dense_prior_pipeline::predictor;
    pub use dense_prior_pipeline::preprocess;
}

pub use dense_prior_pipeline::{
    AlignError, AlignOptions, GlobalAligner, PairPredictor, PipelineError, PredictorError, Stage,
};

/// Common imports.
pub mod prelude {
    pub use crate::core::{CameraDataset, Device, PointCloud, SourceView};
    pub use crate::dense_init::{DenseInitProblem, DensePriorConfig};
    pub use crate::initializer::{
        Collaborators, DenseStereoInitializer, InitializerRegistry, PointCloudInitializer,
        PointPrior, SceneModel, initialize_model,
    };
    pub use crate::session::{PriorSession, ProblemType};
    pub use crate::{GlobalAligner, PairPredictor, PipelineError, Stage};
}
