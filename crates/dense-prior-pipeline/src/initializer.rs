//! Point-cloud initializers for scene representations.
//!
//! An initializer fills a [`SceneModel`] from a camera dataset. Strategies
//! are looked up by name in an [`InitializerRegistry`]:
//!
//! - `"dense_stereo"`: runs the dense pipeline into a cached artifact, then
//!   loads it ([`DenseStereoInitializer`]).
//! - `"ply"`: loads an existing point-cloud file ([`PlyFileInitializer`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use dense_prior_core::{CameraDataset, Device, PointCloud};
use dense_prior_io::load_ply;
use log::info;
use serde::{Deserialize, Serialize};

use crate::aligner::GlobalAligner;
use crate::dense_init::{
    DenseInitOutput, DenseInitProblem, DensePriorConfig, run_dense_init, select_input,
};
use crate::error::PipelineError;
use crate::predictor::PairPredictor;
use crate::session::PriorSession;

/// Scene representation that can be seeded from a point cloud.
pub trait SceneModel {
    fn init_from_point_cloud(&mut self, cloud: PointCloud) -> Result<()>;
}

/// Minimal scene handle that just holds the seed cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointPrior {
    pub cloud: Option<PointCloud>,
}

impl SceneModel for PointPrior {
    fn init_from_point_cloud(&mut self, cloud: PointCloud) -> Result<()> {
        self.cloud = Some(cloud);
        Ok(())
    }
}

pub trait PointCloudInitializer {
    /// Registry name of the strategy.
    fn name(&self) -> &'static str;

    /// Seed `model` from `dataset`.
    ///
    /// Strategies that cache their result recompute it only when
    /// `overwrite` is set or no cached result exists.
    fn initialize(
        &mut self,
        model: &mut dyn SceneModel,
        dataset: &dyn CameraDataset,
        overwrite: bool,
    ) -> Result<()>;
}

/// Run `initializer` on `model` and hand the seeded model back.
pub fn initialize_model<M: SceneModel>(
    initializer: &mut dyn PointCloudInitializer,
    mut model: M,
    dataset: &dyn CameraDataset,
    overwrite: bool,
) -> Result<M> {
    initializer.initialize(&mut model, dataset, overwrite)?;
    Ok(model)
}

fn load_artifact(path: &Path) -> Result<PointCloud, PipelineError> {
    load_ply(path).map_err(|source| PipelineError::ArtifactRead {
        path: path.to_path_buf(),
        source,
    })
}

/// External models and the device they run on.
pub struct Collaborators {
    pub predictor: Box<dyn PairPredictor>,
    pub aligner: Box<dyn GlobalAligner>,
    pub device: Device,
}

/// Resolve the workspace directory, creating it if needed.
///
/// Without a configured directory a fresh temporary directory is created
/// and kept on disk after the initializer is dropped.
pub fn resolve_workspace(dir: Option<&Path>) -> Result<PathBuf, PipelineError> {
    match dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|source| PipelineError::Configuration {
                path: dir.to_path_buf(),
                source,
            })?;
            Ok(dir.to_path_buf())
        }
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("dense-prior-")
                .tempdir()
                .map_err(|source| PipelineError::Configuration {
                    path: std::env::temp_dir(),
                    source,
                })?;
            let path = tmp.keep();
            info!("created temporary workspace {}", path.display());
            Ok(path)
        }
    }
}

/// Dense stereo prior with an on-disk cache.
///
/// The fused cloud lives at `<workspace>/<artifact_name>`. The pipeline runs
/// when that file is missing or `overwrite` is set; afterwards the file is
/// loaded into the model either way. Concurrent initializers sharing a
/// workspace must be serialized by the caller.
pub struct DenseStereoInitializer {
    config: DensePriorConfig,
    workspace: PathBuf,
    collaborators: Collaborators,
    last_report: Option<DenseInitOutput>,
}

impl DenseStereoInitializer {
    pub const NAME: &'static str = "dense_stereo";

    /// # Errors
    ///
    /// [`PipelineError::InvalidConfig`] or [`PipelineError::Configuration`]
    /// when the config is rejected or the workspace cannot be created.
    pub fn new(
        config: DensePriorConfig,
        collaborators: Collaborators,
    ) -> Result<Self, PipelineError> {
        config.check()?;
        let workspace = resolve_workspace(config.workspace_dir.as_deref())?;
        Ok(Self {
            config,
            workspace,
            collaborators,
            last_report: None,
        })
    }

    pub fn config(&self) -> &DensePriorConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.config.artifact_path(&self.workspace)
    }

    /// Report of the most recent pipeline run, if one ran.
    pub fn last_report(&self) -> Option<&DenseInitOutput> {
        self.last_report.as_ref()
    }

    /// Run the full pipeline and write the artifact.
    pub fn process_dataset(&mut self, dataset: &dyn CameraDataset) -> Result<DenseInitOutput> {
        let artifact = self.artifact_path();
        let input = select_input(dataset, self.config.max_images)?;
        let mut session = PriorSession::<DenseInitProblem>::with_config(self.config.clone())?;
        session.set_input(input)?;

        let Collaborators {
            predictor,
            aligner,
            device,
        } = &mut self.collaborators;
        run_dense_init(
            &mut session,
            predictor.as_mut(),
            aligner.as_mut(),
            device,
            &artifact,
        )?;

        let report = session.export()?;
        self.last_report = Some(report.clone());
        Ok(report)
    }
}

impl PointCloudInitializer for DenseStereoInitializer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(
        &mut self,
        model: &mut dyn SceneModel,
        dataset: &dyn CameraDataset,
        overwrite: bool,
    ) -> Result<()> {
        let artifact = self.artifact_path();
        if overwrite || !artifact.exists() {
            self.process_dataset(dataset)?;
        } else {
            info!("reusing cached point cloud {}", artifact.display());
        }
        let cloud = load_artifact(&artifact)?;
        model.init_from_point_cloud(cloud)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlyFileOptions {
    pub path: PathBuf,
}

/// Loads a point cloud file as is.
#[derive(Debug, Clone)]
pub struct PlyFileInitializer {
    path: PathBuf,
}

impl PlyFileInitializer {
    pub const NAME: &'static str = "ply";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PointCloudInitializer for PlyFileInitializer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn initialize(
        &mut self,
        model: &mut dyn SceneModel,
        _dataset: &dyn CameraDataset,
        _overwrite: bool,
    ) -> Result<()> {
        let cloud = load_artifact(&self.path)?;
        info!("loaded {} points from {}", cloud.len(), self.path.display());
        model.init_from_point_cloud(cloud)
    }
}

/// Builds an initializer from JSON options and optional collaborators.
pub type InitializerFactory =
    fn(&serde_json::Value, Option<Collaborators>) -> Result<Box<dyn PointCloudInitializer>>;

fn dense_stereo_factory(
    options: &serde_json::Value,
    collaborators: Option<Collaborators>,
) -> Result<Box<dyn PointCloudInitializer>> {
    let config: DensePriorConfig = if options.is_null() {
        DensePriorConfig::default()
    } else {
        serde_json::from_value(options.clone()).context("invalid dense_stereo options")?
    };
    let collaborators =
        collaborators.context("dense_stereo initializer needs a predictor and an aligner")?;
    Ok(Box::new(DenseStereoInitializer::new(config, collaborators)?))
}

fn ply_factory(
    options: &serde_json::Value,
    _collaborators: Option<Collaborators>,
) -> Result<Box<dyn PointCloudInitializer>> {
    let options: PlyFileOptions =
        serde_json::from_value(options.clone()).context("invalid ply options")?;
    Ok(Box::new(PlyFileInitializer::new(options.path)))
}

/// Name to factory table of initializer strategies.
#[derive(Default)]
pub struct InitializerRegistry {
    factories: BTreeMap<String, InitializerFactory>,
}

impl InitializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `"dense_stereo"` and `"ply"` strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DenseStereoInitializer::NAME, dense_stereo_factory);
        registry.register(PlyFileInitializer::NAME, ply_factory);
        registry
    }

    /// Add or replace a strategy. Returns the factory it replaced.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: InitializerFactory,
    ) -> Option<InitializerFactory> {
        self.factories.insert(name.into(), factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(
        &self,
        name: &str,
        options: &serde_json::Value,
        collaborators: Option<Collaborators>,
    ) -> Result<Box<dyn PointCloudInitializer>> {
        let Some(factory) = self.factories.get(name) else {
            let known: Vec<&str> = self.names().collect();
            bail!("unknown initializer {name:?} (known: {})", known.join(", "));
        };
        factory(options, collaborators)
            .with_context(|| format!("failed to create initializer {name:?}"))
    }
}
