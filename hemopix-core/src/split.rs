//! Train/validation split record.

use crate::error::{Error, Result};
use ndarray::{Array2, Axis};
use std::collections::HashSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A persisted partition of a file set into train and validation subsets.
///
/// Row `i` of each label matrix holds the labels of filename `i` of the
/// same subset.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplitRecord {
    pub train_filenames: Vec<String>,
    pub train_labels: Array2<f32>,
    pub validation_filenames: Vec<String>,
    pub validation_labels: Array2<f32>,
}

impl SplitRecord {
    /// Creates a record, checking its invariants.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if filename and label counts disagree,
    /// or [`Error::OverlappingSplit`] if a filename is in both subsets.
    pub fn new(
        train_filenames: Vec<String>,
        train_labels: Array2<f32>,
        validation_filenames: Vec<String>,
        validation_labels: Array2<f32>,
    ) -> Result<Self> {
        let record = Self {
            train_filenames,
            train_labels,
            validation_filenames,
            validation_labels,
        };
        record.validate()?;
        Ok(record)
    }

    /// Checks row counts and disjointness.
    ///
    /// # Errors
    /// See [`SplitRecord::new`].
    pub fn validate(&self) -> Result<()> {
        check_rows("train", self.train_filenames.len(), &self.train_labels)?;
        check_rows(
            "validation",
            self.validation_filenames.len(),
            &self.validation_labels,
        )?;
        if self.train_labels.ncols() != self.validation_labels.ncols()
            && !self.train_filenames.is_empty()
            && !self.validation_filenames.is_empty()
        {
            return Err(Error::ShapeMismatch(format!(
                "train labels have {} columns, validation labels have {}",
                self.train_labels.ncols(),
                self.validation_labels.ncols()
            )));
        }

        let train: HashSet<&str> = self.train_filenames.iter().map(String::as_str).collect();
        if let Some(shared) = self
            .validation_filenames
            .iter()
            .find(|name| train.contains(name.as_str()))
        {
            return Err(Error::OverlappingSplit(shared.clone()));
        }
        Ok(())
    }

    /// Total number of files across both subsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.train_filenames.len() + self.validation_filenames.len()
    }

    /// Returns true if both subsets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fraction of files assigned to validation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn validation_fraction(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.validation_filenames.len() as f64 / self.len() as f64
    }
}

fn check_rows(subset: &str, filenames: usize, labels: &Array2<f32>) -> Result<()> {
    let rows = labels.len_of(Axis(0));
    if rows == filenames {
        Ok(())
    } else {
        Err(Error::ShapeMismatch(format!(
            "{subset} subset has {filenames} filenames but {rows} label rows"
        )))
    }
}
