//! RSNA intracranial hemorrhage slices.

use crate::error::Result;
use crate::split::RSNA_TRAIN_DIR;
use crate::{check_index, Dataset, Transform};
use hemopix_core::{SplitRecord, WindowSpec, WindowedTensor};
use hemopix_io::read_2d;
use ndarray::{Array1, Array2, Array3, Axis};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One windowed slice and its label vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RsnaSample {
    /// `(1 + windows, rows, cols)`; channel 0 is the slice's own window.
    pub image: Array3<f32>,
    /// Subtype indicators, `any` last.
    pub label: Array1<f32>,
}

/// RSNA slices listed by file name, each windowed on access.
#[derive(Clone)]
pub struct RsnaDataset {
    image_dir: PathBuf,
    filenames: Vec<String>,
    labels: Array2<f32>,
    windows: Vec<WindowSpec>,
    transform: Option<Transform>,
}

impl std::fmt::Debug for RsnaDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsnaDataset")
            .field("image_dir", &self.image_dir)
            .field("len", &self.filenames.len())
            .field("windows", &self.windows)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl RsnaDataset {
    /// Creates a dataset over `root/stage_2_train/<filename>`.
    ///
    /// # Errors
    /// Returns a shape error if `labels` does not have one row per filename.
    pub fn new<P: AsRef<Path>>(
        root: P,
        filenames: Vec<String>,
        labels: Array2<f32>,
        windows: Vec<WindowSpec>,
    ) -> Result<Self> {
        if labels.len_of(Axis(0)) != filenames.len() {
            return Err(hemopix_core::Error::ShapeMismatch(format!(
                "{} filenames but {} label rows",
                filenames.len(),
                labels.len_of(Axis(0))
            ))
            .into());
        }
        Ok(Self {
            image_dir: root.as_ref().join(RSNA_TRAIN_DIR),
            filenames,
            labels,
            windows,
            transform: None,
        })
    }

    /// Creates `(train, validation)` datasets from a split.
    ///
    /// # Errors
    /// Returns an error if the record is inconsistent.
    pub fn from_split<P: AsRef<Path>>(
        root: P,
        record: &SplitRecord,
        windows: &[WindowSpec],
    ) -> Result<(Self, Self)> {
        let root = root.as_ref();
        let train = Self::new(
            root,
            record.train_filenames.clone(),
            record.train_labels.clone(),
            windows.to_vec(),
        )?;
        let validation = Self::new(
            root,
            record.validation_filenames.clone(),
            record.validation_labels.clone(),
            windows.to_vec(),
        )?;
        Ok((train, validation))
    }

    /// Set a transform applied to every windowed tensor.
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Array3<f32>) -> Array3<f32> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Slice file names, in index order.
    #[must_use]
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// Label matrix, one row per slice.
    #[must_use]
    pub fn labels(&self) -> &Array2<f32> {
        &self.labels
    }

    /// Extra windows stacked after the default window.
    #[must_use]
    pub fn windows(&self) -> &[WindowSpec] {
        &self.windows
    }

    /// Full path of slice `index`.
    #[must_use]
    pub fn path(&self, index: usize) -> Option<PathBuf> {
        self.filenames.get(index).map(|name| self.image_dir.join(name))
    }
}

impl Dataset for RsnaDataset {
    type Sample = RsnaSample;

    fn len(&self) -> usize {
        self.filenames.len()
    }

    fn get(&self, index: usize) -> Result<RsnaSample> {
        check_index(index, self.len())?;
        let path = self.image_dir.join(&self.filenames[index]);
        let (raw, calibration) = read_2d(&path)?;

        let mut image = WindowedTensor::build(&raw, &calibration, &self.windows).into_array();
        if let Some(transform) = &self.transform {
            image = transform(image);
        }
        Ok(RsnaSample {
            image,
            label: self.labels.row(index).to_owned(),
        })
    }
}
