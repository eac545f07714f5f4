//! hemopix-io: File I/O for hemopix.
//!
//! This crate reads 2D DICOM slices and 3D NIfTI volumes, parses the
//! label tables shipped with each dataset, enumerates dataset directories,
//! and persists train/validation splits.
//!

mod error;
pub mod labels;
mod planar;
pub mod scanner;
pub mod store;
mod volumetric;

pub use error::{Error, Result};
pub use labels::{PhysioNetLabelTable, RsnaLabelTable, PHYSIONET_SUBTYPES, RSNA_SUBTYPES};
pub use planar::{calibration_from_object, read_2d};
pub use scanner::list_files;
pub use store::{FileSplitStore, MemorySplitStore, SplitStore};
pub use volumetric::read_3d;

use std::path::Path;

/// Fails with [`Error::NotFound`] unless `path` is an existing regular file.
pub(crate) fn ensure_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::NotFound {
            path: path.to_path_buf(),
        })
    }
}
