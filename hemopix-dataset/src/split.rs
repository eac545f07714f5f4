//! Deterministic train/validation split of the RSNA slices.
//!
//! The split is computed once per dataset root and persisted through a
//! [`SplitStore`]; later runs reload it unless a rebuild is forced.
//!
//! # Algorithm
//!
//! 1. List `root/stage_2_train/*.dcm`, sorted by name
//! 2. Drop the [`CORRUPTED_FILES`] denylist
//! 3. Look up every file's label row in `root/stage_2_train.csv`
//! 4. Shuffle indices `0..n` with Fisher-Yates driven by
//!    `ChaCha8Rng::seed_from_u64(seed)`: for `i` from `n - 1` down to `1`,
//!    swap positions `i` and `j`, with `j` drawn uniformly from `0..=i`
//! 5. The first `floor(n * validation_fraction)` shuffled indices form the
//!    validation subset, the rest the train subset, both in shuffled order
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use crate::error::Result;
use hemopix_core::SplitRecord;
use hemopix_io::{list_files, FileSplitStore, RsnaLabelTable, SplitStore, RSNA_SUBTYPES};
use ndarray::{Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};

/// Known-corrupted slices, excluded from every split.
pub const CORRUPTED_FILES: &[&str] = &["ID_6431af929.dcm"];

/// Directory of RSNA training slices, relative to the dataset root.
pub const RSNA_TRAIN_DIR: &str = "stage_2_train";

/// RSNA label table, relative to the dataset root.
pub const RSNA_LABELS_CSV: &str = "stage_2_train.csv";

/// Split parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitConfig {
    /// Fraction of files assigned to validation, in `[0, 1)`.
    pub validation_fraction: f64,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.05,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Set the validation fraction.
    #[must_use]
    pub fn with_validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = fraction;
        self
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of validation files for a set of `total` files.
    #[must_use]
    pub fn validation_len(&self, total: usize) -> usize {
        ((total as f64 * self.validation_fraction).floor() as usize).min(total)
    }

    /// # Errors
    /// Returns [`hemopix_core::Error::InvalidFraction`] if the fraction is outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if (0.0..1.0).contains(&self.validation_fraction) {
            Ok(())
        } else {
            Err(hemopix_core::Error::InvalidFraction(self.validation_fraction).into())
        }
    }
}

/// Shuffles `0..n` and cuts it into `(train, validation)` index lists.
///
/// See the module documentation for the exact algorithm.
///
/// # Errors
/// Returns an error if `validation_fraction` is outside `[0, 1)`.
pub fn shuffle_split(
    n: usize,
    validation_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let config = SplitConfig {
        validation_fraction,
        seed,
    };
    config.validate()?;

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }

    let train = indices.split_off(config.validation_len(n));
    Ok((train, indices))
}

/// Image identifier of a slice file name (`ID_abc.dcm` → `ID_abc`).
#[must_use]
pub fn base_id(filename: &str) -> &str {
    filename.split_once('.').map_or(filename, |(id, _)| id)
}

/// Builds or reloads the split for one dataset root.
pub struct SplitBuilder<S = FileSplitStore> {
    root: PathBuf,
    store: S,
    config: SplitConfig,
}

impl SplitBuilder<FileSplitStore> {
    /// Creates a builder persisting its split under `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            store: FileSplitStore::new(&root),
            root,
            config: SplitConfig::default(),
        }
    }
}

impl<S: SplitStore> SplitBuilder<S> {
    /// Creates a builder with an explicit persistence port.
    pub fn with_store<P: AsRef<Path>>(root: P, store: S) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            store,
            config: SplitConfig::default(),
        }
    }

    /// Set the split parameters.
    #[must_use]
    pub fn with_config(mut self, config: SplitConfig) -> Self {
        self.config = config;
        self
    }

    /// Current split parameters.
    #[must_use]
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// The persistence port.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the stored split, or computes and stores a new one.
    ///
    /// With `force_rebuild` the stored split is ignored and overwritten.
    ///
    /// # Errors
    /// - `NotFound` if the slice directory or label table is missing
    /// - `MissingLabel` if a listed slice has no complete label row
    /// - `InvalidFraction` for a fraction outside `[0, 1)` when a new split
    ///   has to be computed
    pub fn build(&self, force_rebuild: bool) -> Result<SplitRecord> {
        if !force_rebuild {
            if let Some(record) = self.store.load()? {
                log::info!(
                    "loaded stored split for {}: {} train, {} validation",
                    self.root.display(),
                    record.train_filenames.len(),
                    record.validation_filenames.len()
                );
                return Ok(record);
            }
        }

        self.config.validate()?;
        let record = self.compute()?;
        self.store.store(&record)?;
        log::info!(
            "built split for {} (seed {}, fraction {}): {} train, {} validation",
            self.root.display(),
            self.config.seed,
            self.config.validation_fraction,
            record.train_filenames.len(),
            record.validation_filenames.len()
        );
        Ok(record)
    }

    /// Computes the split without consulting or updating the store.
    ///
    /// # Errors
    /// See [`SplitBuilder::build`].
    pub fn compute(&self) -> Result<SplitRecord> {
        let mut filenames = list_files(self.root.join(RSNA_TRAIN_DIR), Some("dcm"))?;
        filenames.retain(|name| {
            let corrupted = CORRUPTED_FILES.contains(&name.as_str());
            if corrupted {
                log::warn!("skipping known-corrupted slice {name}");
            }
            !corrupted
        });

        let table = RsnaLabelTable::from_path(self.root.join(RSNA_LABELS_CSV))?;
        let mut labels = Array2::<f32>::zeros((filenames.len(), RSNA_SUBTYPES.len()));
        for (mut row, name) in labels.axis_iter_mut(Axis(0)).zip(&filenames) {
            let values = table.labels_for(base_id(name))?;
            row.assign(&ArrayView1::from(&values[..]));
        }

        let (train, validation) =
            shuffle_split(filenames.len(), self.config.validation_fraction, self.config.seed)?;
        let pick = |indices: &[usize]| -> Vec<String> {
            indices.iter().map(|&i| filenames[i].clone()).collect()
        };

        Ok(SplitRecord::new(
            pick(&train),
            labels.select(Axis(0), &train),
            pick(&validation),
            labels.select(Axis(0), &validation),
        )?)
    }
}

/// Builds (or reloads) the split stored under `root`.
///
/// # Errors
/// See [`SplitBuilder::build`].
pub fn build_split<P: AsRef<Path>>(
    root: P,
    validation_fraction: f64,
    seed: u64,
    force_rebuild: bool,
) -> Result<SplitRecord> {
    SplitBuilder::new(root)
        .with_config(SplitConfig {
            validation_fraction,
            seed,
        })
        .build(force_rebuild)
}
