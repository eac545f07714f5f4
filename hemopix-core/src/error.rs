//! Error types for hemopix-core.

use thiserror::Error;

/// Result type alias for hemopix operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for hemopix operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Window width must be strictly positive.
    #[error("invalid window: center {center}, width {width} (width must be > 0)")]
    InvalidWindow { center: i32, width: i32 },

    /// Validation fraction outside `[0, 1)`.
    #[error("invalid validation fraction: {0} (expected 0 <= fraction < 1)")]
    InvalidFraction(f64),

    /// Array shapes that must agree do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A filename appears in both train and validation subsets.
    #[error("file {0} appears in both train and validation subsets")]
    OverlappingSplit(String),

    /// Collation was asked to stack zero samples.
    #[error("cannot collate an empty batch")]
    EmptyBatch,

    /// Sample index past the end of a dataset.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
