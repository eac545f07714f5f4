//! Raw image containers and in-plane slice rotation.

use ndarray::{Array2, Array3, ArrayBase, Axis, Data, Ix2, Ix3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single slice of stored intensities, indexed `[row, col]`.
pub type RawImage = Array2<f32>;

/// A stack of slices, indexed `[x, y, slice]`.
pub type RawVolume = Array3<f32>;

/// In-plane rotation applied to every slice of a volume.
///
/// Scans and their masks must be loaded with the same rotation so that
/// voxel `(x, y, z)` of one refers to the same location in the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Rotation {
    /// Leave slices as stored.
    #[default]
    None,
    /// Rotate each slice 90° counter-clockwise when displayed with row 0 on top.
    CounterClockwise,
    /// Rotate each slice 90° clockwise.
    Clockwise,
}

impl Rotation {
    /// Inverse rotation.
    #[must_use]
    pub fn inverse(self) -> Self {
        match self {
            Self::None => Self::None,
            Self::CounterClockwise => Self::Clockwise,
            Self::Clockwise => Self::CounterClockwise,
        }
    }

    /// Maps a source index `(i, j)` of a `rows x cols` slice to its rotated position.
    #[must_use]
    pub fn map_index(self, (i, j): (usize, usize), rows: usize, cols: usize) -> (usize, usize) {
        match self {
            Self::None => (i, j),
            Self::CounterClockwise => (cols - 1 - j, i),
            Self::Clockwise => (j, rows - 1 - i),
        }
    }
}

/// Rotates one slice. A `rows x cols` input becomes `cols x rows`.
#[must_use]
pub fn rotate_slice<S>(slice: &ArrayBase<S, Ix2>, rotation: Rotation) -> Array2<f32>
where
    S: Data<Elem = f32>,
{
    let mut view = slice.view();
    match rotation {
        Rotation::None => {}
        Rotation::CounterClockwise => {
            view = view.reversed_axes();
            view.invert_axis(Axis(0));
        }
        Rotation::Clockwise => {
            view = view.reversed_axes();
            view.invert_axis(Axis(1));
        }
    }
    view.as_standard_layout().into_owned()
}

/// Rotates every `[:, :, z]` slice of a volume by the same angle.
#[must_use]
pub fn rotate_slices<S>(volume: &ArrayBase<S, Ix3>, rotation: Rotation) -> Array3<f32>
where
    S: Data<Elem = f32>,
{
    let mut view = volume.view();
    match rotation {
        Rotation::None => {}
        Rotation::CounterClockwise => {
            view = view.permuted_axes([1, 0, 2]);
            view.invert_axis(Axis(0));
        }
        Rotation::Clockwise => {
            view = view.permuted_axes([1, 0, 2]);
            view.invert_axis(Axis(1));
        }
    }
    view.as_standard_layout().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    #[test]
    fn test_rotate_slice_counter_clockwise() {
        let slice = array![[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let rotated = rotate_slice(&slice, Rotation::CounterClockwise);
        assert_eq!(rotated, array![[3.0, 6.0], [2.0, 5.0], [1.0, 4.0]]);
    }

    #[test]
    fn test_rotate_slice_clockwise() {
        let slice = array![[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let rotated = rotate_slice(&slice, Rotation::Clockwise);
        assert_eq!(rotated, array![[4.0, 1.0], [5.0, 2.0], [6.0, 3.0]]);
    }

    #[test]
    fn test_rotation_inverse_roundtrip() {
        let slice = Array2::from_shape_fn((4, 5), |(r, c)| (r * 5 + c) as f32);
        for rotation in [Rotation::CounterClockwise, Rotation::Clockwise] {
            let there = rotate_slice(&slice, rotation);
            let back = rotate_slice(&there, rotation.inverse());
            assert_eq!(back, slice);
        }
        assert_eq!(rotate_slice(&slice, Rotation::None), slice);
    }

    #[test]
    fn test_map_index_matches_rotation() {
        let (rows, cols) = (3, 4);
        let slice = Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32);
        for rotation in [Rotation::None, Rotation::CounterClockwise, Rotation::Clockwise] {
            let rotated = rotate_slice(&slice, rotation);
            for ((i, j), &value) in slice.indexed_iter() {
                assert_eq!(rotated[rotation.map_index((i, j), rows, cols)], value);
            }
        }
    }

    #[test]
    fn test_volume_rotation_matches_per_slice() {
        let volume = Array3::from_shape_fn((3, 4, 2), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        let rotated = rotate_slices(&volume, Rotation::CounterClockwise);
        assert_eq!(rotated.dim(), (4, 3, 2));
        for z in 0..2 {
            let expected = rotate_slice(&volume.slice(s![.., .., z]), Rotation::CounterClockwise);
            assert_eq!(rotated.slice(s![.., .., z]), expected);
        }
    }

    #[test]
    fn test_scan_and_mask_stay_aligned() {
        let scan = Array3::from_shape_fn((5, 5, 3), |(x, y, z)| (x * 25 + y * 5 + z) as f32);
        let mut mask = Array3::<f32>::zeros((5, 5, 3));
        mask[[1, 3, 2]] = 1.0;
        let marked = scan[[1, 3, 2]];

        for rotation in [Rotation::CounterClockwise, Rotation::Clockwise] {
            let scan_r = rotate_slices(&scan, rotation);
            let mask_r = rotate_slices(&mask, rotation);
            let hits: Vec<_> = mask_r
                .indexed_iter()
                .filter(|(_, &v)| v > 0.0)
                .map(|(idx, _)| idx)
                .collect();
            assert_eq!(hits.len(), 1);
            assert_eq!(scan_r[hits[0]], marked);
        }
    }
}
