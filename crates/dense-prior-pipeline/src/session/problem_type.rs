//! Problem type trait for pipeline sessions.

use std::fmt::Debug;

use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};

/// What a session drops when its input or config is replaced. Exports are
/// always kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationPolicy {
    pub clear_state: bool,
    pub clear_output: bool,
}

impl InvalidationPolicy {
    pub const KEEP_ALL: Self = Self {
        clear_state: false,
        clear_output: false,
    };

    /// Drop intermediate state and output, keep exports.
    pub const CLEAR_COMPUTED: Self = Self {
        clear_state: true,
        clear_output: true,
    };
}

impl Default for InvalidationPolicy {
    fn default() -> Self {
        Self::KEEP_ALL
    }
}

/// Associated types and hooks of one pipeline problem.
///
/// Behavior lives in step functions taking `&mut PriorSession<Self>`, so
/// each step can take its own collaborators (predictor, aligner, device)
/// without widening this trait.
pub trait ProblemType: Sized + 'static {
    /// Run parameters. `Default` must be a usable configuration.
    type Config: Clone + Default + Serialize + DeserializeOwned + Debug;

    /// Data the run consumes.
    type Input: Clone + Serialize + DeserializeOwned + Debug;

    /// Intermediate results produced and consumed by the steps.
    type State: Clone + Default + Serialize + DeserializeOwned + Debug;

    /// Final result of a complete run.
    type Output: Clone + Serialize + DeserializeOwned + Debug;

    /// Format handed to callers by [`PriorSession::export`](super::PriorSession::export).
    type Export: Clone + Serialize + DeserializeOwned + Debug;

    /// Stable snake_case identifier, recorded in session metadata.
    fn name() -> &'static str;

    fn schema_version() -> u32 {
        1
    }

    fn validate_input(_input: &Self::Input) -> Result<()> {
        Ok(())
    }

    fn validate_config(_config: &Self::Config) -> Result<()> {
        Ok(())
    }

    fn validate_input_config(_input: &Self::Input, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Default: a new input invalidates state and output.
    fn on_input_change() -> InvalidationPolicy {
        InvalidationPolicy::CLEAR_COMPUTED
    }

    /// Default: config changes invalidate nothing.
    fn on_config_change() -> InvalidationPolicy {
        InvalidationPolicy::KEEP_ALL
    }

    fn export(output: &Self::Output, config: &Self::Config) -> Result<Self::Export>;
}
