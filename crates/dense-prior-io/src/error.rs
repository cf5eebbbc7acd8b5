use std::path::PathBuf;

use dense_prior_core::CoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlyError>;

#[derive(Debug, Error)]
pub enum PlyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed PLY: {0}")]
    Parse(String),
    #[error("unsupported PLY layout: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
