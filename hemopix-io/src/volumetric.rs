//! 3D NIfTI volume reader.
#![allow(clippy::cast_possible_truncation)]

use crate::{ensure_file, Error, Result};
use hemopix_core::{rotate_slices, RawVolume, Rotation};
use nifti::{NiftiObject, NiftiVolume, RandomAccessNiftiVolume, ReaderOptions};
use std::path::Path;

/// Reads a NIfTI volume as `[x, y, slice]`, applying `rotation` to every slice.
///
/// Values are returned as floating point with the file's scaling applied.
/// Trailing singleton dimensions (e.g. a time axis of length 1) are dropped.
///
/// # Errors
/// - [`Error::NotFound`] if `path` is not an existing file
/// - [`Error::Nifti`] if the file cannot be parsed
/// - [`Error::InvalidFormat`] if the volume is not three-dimensional
pub fn read_3d<P: AsRef<Path>>(path: P, rotation: Rotation) -> Result<RawVolume> {
    let path = path.as_ref();
    ensure_file(path)?;

    let object = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| nifti_error(path, e))?;
    let volume = object.into_volume();

    let dims: Vec<usize> = volume.dim().iter().map(|&d| usize::from(d)).collect();
    if dims.len() < 3 || dims[3..].iter().any(|&d| d != 1) {
        return Err(Error::InvalidFormat(format!(
            "{}: expected a 3D volume, got dimensions {dims:?}",
            path.display()
        )));
    }

    let mut data = RawVolume::zeros((dims[0], dims[1], dims[2]));
    let mut coords = vec![0_u16; dims.len()];
    for ((x, y, z), value) in data.indexed_iter_mut() {
        // Bounded by the u16 dimensions read above.
        coords[0] = x as u16;
        coords[1] = y as u16;
        coords[2] = z as u16;
        *value = volume.get_f32(&coords).map_err(|e| nifti_error(path, e))?;
    }

    log::debug!(
        "read {} ({}x{}x{}, rotation {rotation:?})",
        path.display(),
        dims[0],
        dims[1],
        dims[2]
    );
    if rotation == Rotation::None {
        Ok(data)
    } else {
        Ok(rotate_slices(&data, rotation))
    }
}

fn nifti_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Nifti {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
