//! Dataset error types.

use thiserror::Error;

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Dataset error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Reader, label table or split store error.
    #[error(transparent)]
    Io(#[from] hemopix_io::Error),

    /// Core library error.
    #[error(transparent)]
    Core(#[from] hemopix_core::Error),

    /// A volume filename does not encode a patient number.
    #[error("cannot derive patient number from file name {0:?}")]
    InvalidFilename(String),

    /// Scan and mask volumes disagree in shape.
    #[error("mask {name} has shape {mask:?}, scan has {scan:?}")]
    MaskShape {
        name: String,
        scan: (usize, usize, usize),
        mask: (usize, usize, usize),
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if this is a missing-label failure.
    #[must_use]
    pub fn is_missing_label(&self) -> bool {
        matches!(self, Self::Io(hemopix_io::Error::MissingLabel { .. }))
    }

    /// Returns true if this is a missing-input failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(hemopix_io::Error::NotFound { .. }))
    }
}
