//! hemopix-dataset: Splits, dataset adapters and collation.
//!
//! This crate builds on the readers and the windowing engine:
//! - **Split** - seeded, persisted train/validation partition of the RSNA slices
//! - **Adapters** - indexable RSNA (slice + label) and PhysioNet
//!   (slice + mask + label) datasets yielding windowed tensors
//! - **Collation** - batch stacking and label-subset selection
//!
#![warn(missing_docs)]

pub mod collate;
pub mod config;
mod error;
pub mod physionet;
pub mod rsna;
pub mod split;

pub use collate::{
    collate_binary_label, collate_image_label, collate_image_mask, collate_labeled,
    collate_physionet_image_label, collate_subtype_label, stack_channels, LabelSelection,
    LabeledSample,
};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use physionet::{PhysioNetDataset, PhysioNetSample};
pub use rsna::{RsnaDataset, RsnaSample};
pub use split::{build_split, shuffle_split, SplitBuilder, SplitConfig, CORRUPTED_FILES};

// Re-export the types adapters are parameterised with
pub use hemopix_core::{CalibrationParams, Rotation, SplitRecord, WindowSpec};

use ndarray::Array3;
use std::sync::Arc;

/// Post-windowing tensor transform, applied to `(channels, rows, cols)` arrays.
pub type Transform = Arc<dyn Fn(Array3<f32>) -> Array3<f32> + Send + Sync>;

/// Indexable sequence of samples.
pub trait Dataset: Send + Sync {
    /// Item type.
    type Sample;

    /// Number of samples.
    fn len(&self) -> usize;

    /// Returns true if there are no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads and windows sample `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is out of range or the sample cannot be read.
    fn get(&self, index: usize) -> Result<Self::Sample>;
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(hemopix_core::Error::IndexOutOfRange { index, len }.into())
    }
}
