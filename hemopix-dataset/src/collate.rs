//! Batch collation.
//!
//! Samples are stacked along a new leading batch axis: images become
//! `(batch, channels, rows, cols)`, labels `(batch, k)` and masks
//! `(batch, rows, cols)`. Every sample in a batch must have the same shape.

use crate::error::Result;
use crate::physionet::PhysioNetSample;
use crate::rsna::RsnaSample;
use ndarray::{
    s, Array, Array2, Array3, Array4, ArrayView, ArrayView1, ArrayView3, Axis, Dimension,
    RemoveAxis,
};

/// A sample carrying an image tensor and a label vector.
pub trait LabeledSample {
    /// `(channels, rows, cols)` image.
    fn image(&self) -> ArrayView3<'_, f32>;
    /// Label vector, "any hemorrhage" last.
    fn label(&self) -> ArrayView1<'_, f32>;
}

impl LabeledSample for RsnaSample {
    fn image(&self) -> ArrayView3<'_, f32> {
        self.image.view()
    }

    fn label(&self) -> ArrayView1<'_, f32> {
        self.label.view()
    }
}

impl LabeledSample for PhysioNetSample {
    fn image(&self) -> ArrayView3<'_, f32> {
        self.image.view()
    }

    fn label(&self) -> ArrayView1<'_, f32> {
        self.label.view()
    }
}

/// Which label columns a batch keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelSelection {
    /// Every column.
    #[default]
    All,
    /// Only the last ("any hemorrhage") column, kept two-dimensional.
    Any,
    /// Every column except the last.
    Subtypes,
}

impl LabelSelection {
    /// Selects columns of a `(batch, k)` label matrix.
    #[must_use]
    pub fn select(self, labels: Array2<f32>) -> Array2<f32> {
        match self {
            Self::All => labels,
            Self::Any => labels.slice(s![.., -1..]).to_owned(),
            Self::Subtypes => labels.slice(s![.., ..-1]).to_owned(),
        }
    }
}

fn stack<D>(views: &[ArrayView<'_, f32, D>]) -> Result<Array<f32, D::Larger>>
where
    D: Dimension,
    D::Larger: RemoveAxis,
{
    if views.is_empty() {
        return Err(hemopix_core::Error::EmptyBatch.into());
    }
    ndarray::stack(Axis(0), views).map_err(|e| {
        hemopix_core::Error::ShapeMismatch(format!("cannot stack batch: {e}")).into()
    })
}

/// Stacks `(channels, rows, cols)` tensors into a batch.
///
/// # Errors
/// Returns `EmptyBatch` for no tensors and `ShapeMismatch` if shapes differ.
pub fn stack_channels(tensors: &[ArrayView3<'_, f32>]) -> Result<Array4<f32>> {
    stack(tensors)
}

/// Stacks images and selected label columns of a batch.
///
/// # Errors
/// See [`stack_channels`].
pub fn collate_labeled<T: LabeledSample>(
    batch: &[T],
    selection: LabelSelection,
) -> Result<(Array4<f32>, Array2<f32>)> {
    let images: Vec<_> = batch.iter().map(LabeledSample::image).collect();
    let labels: Vec<_> = batch.iter().map(LabeledSample::label).collect();
    Ok((stack(&images)?, selection.select(stack(&labels)?)))
}

/// RSNA batch with all six label columns.
///
/// # Errors
/// See [`stack_channels`].
pub fn collate_image_label(batch: &[RsnaSample]) -> Result<(Array4<f32>, Array2<f32>)> {
    collate_labeled(batch, LabelSelection::All)
}

/// RSNA batch labelled with the "any hemorrhage" column only, shape `(batch, 1)`.
///
/// # Errors
/// See [`stack_channels`].
pub fn collate_binary_label(batch: &[RsnaSample]) -> Result<(Array4<f32>, Array2<f32>)> {
    collate_labeled(batch, LabelSelection::Any)
}

/// RSNA batch labelled with the five subtype columns.
///
/// # Errors
/// See [`stack_channels`].
pub fn collate_subtype_label(batch: &[RsnaSample]) -> Result<(Array4<f32>, Array2<f32>)> {
    collate_labeled(batch, LabelSelection::Subtypes)
}

/// PhysioNet batch of images and masks.
///
/// # Errors
/// See [`stack_channels`].
pub fn collate_image_mask(batch: &[PhysioNetSample]) -> Result<(Array4<f32>, Array3<f32>)> {
    let images: Vec<_> = batch.iter().map(|s| s.image.view()).collect();
    let masks: Vec<_> = batch.iter().map(|s| s.mask.view()).collect();
    Ok((stack(&images)?, stack(&masks)?))
}

/// PhysioNet batch of images and full label vectors.
///
/// # Errors
/// See [`stack_channels`].
pub fn collate_physionet_image_label(
    batch: &[PhysioNetSample],
) -> Result<(Array4<f32>, Array2<f32>)> {
    collate_labeled(batch, LabelSelection::All)
}
