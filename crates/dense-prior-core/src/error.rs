use thiserror::Error;

/// Errors raised by core containers when their invariants would be broken.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("image buffer has {actual} values, expected {expected} for {width}x{height}x3")]
    ImageBufferSize {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error("color count {colors} does not match point count {points}")]
    ColorCountMismatch { points: usize, colors: usize },
    #[error("field of view must lie in (0, pi), got {0}")]
    InvalidFov(f64),
    #[error("image is empty ({width}x{height})")]
    EmptyImage { width: usize, height: usize },
}
