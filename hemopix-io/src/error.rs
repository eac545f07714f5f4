//! I/O error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Input file or directory does not exist.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// A calibration tag is absent or cannot be interpreted.
    #[error("malformed calibration field {field} in {}: {reason}", path.display())]
    MalformedCalibration {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    /// A label table has no entry for an identifier.
    #[error("no label for {id}")]
    MissingLabel { id: String },

    /// DICOM parsing or pixel decoding error.
    #[error("DICOM error in {}: {message}", path.display())]
    Dicom { path: PathBuf, message: String },

    /// NIfTI parsing error.
    #[error("NIfTI error in {}: {message}", path.display())]
    Nifti { path: PathBuf, message: String },

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Split artifact (de)serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] hemopix_core::Error),
}
