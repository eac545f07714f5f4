//! Persistence of train/validation splits.
//!
//! A split is stored as four artifacts under the dataset root, each a
//! serialized collection:
//!
//! | file | content |
//! |---|---|
//! | `train_file_split` | train filenames |
//! | `train_label_split` | train label matrix |
//! | `validation_file_split` | validation filenames |
//! | `validation_label_split` | validation label matrix |
//!
//! Concurrent writers on the same root are not coordinated; callers must
//! not rebuild a split from several processes at once.

use crate::Result;
use hemopix_core::SplitRecord;
use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TRAIN_FILE_SPLIT: &str = "train_file_split";
pub const TRAIN_LABEL_SPLIT: &str = "train_label_split";
pub const VALIDATION_FILE_SPLIT: &str = "validation_file_split";
pub const VALIDATION_LABEL_SPLIT: &str = "validation_label_split";

/// Load-if-exists / store port for split records.
pub trait SplitStore {
    /// Returns the stored record, or `None` if no complete record exists.
    ///
    /// # Errors
    /// Returns an error if a stored record exists but cannot be read.
    fn load(&self) -> Result<Option<SplitRecord>>;

    /// Persists `record`, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written.
    fn store(&self, record: &SplitRecord) -> Result<()>;
}

/// Stores splits as four JSON files under a dataset root.
#[derive(Debug, Clone)]
pub struct FileSplitStore {
    root: PathBuf,
}

impl FileSplitStore {
    /// Creates a store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Dataset root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact paths in `[train files, train labels, validation files, validation labels]` order.
    #[must_use]
    pub fn artifact_paths(&self) -> [PathBuf; 4] {
        [
            TRAIN_FILE_SPLIT,
            TRAIN_LABEL_SPLIT,
            VALIDATION_FILE_SPLIT,
            VALIDATION_LABEL_SPLIT,
        ]
        .map(|name| self.root.join(name))
    }

    /// Returns true if all four artifacts exist.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.artifact_paths().iter().all(|p| p.is_file())
    }
}

impl SplitStore for FileSplitStore {
    fn load(&self) -> Result<Option<SplitRecord>> {
        if !self.is_complete() {
            return Ok(None);
        }
        let [train_files, train_labels, val_files, val_labels] = self.artifact_paths();
        let record = SplitRecord::new(
            read_artifact::<Vec<String>>(&train_files)?,
            read_artifact::<Array2<f32>>(&train_labels)?,
            read_artifact::<Vec<String>>(&val_files)?,
            read_artifact::<Array2<f32>>(&val_labels)?,
        )?;
        Ok(Some(record))
    }

    fn store(&self, record: &SplitRecord) -> Result<()> {
        let paths = self.artifact_paths();
        // An interrupted store must not leave old and new artifacts side by side
        for path in &paths {
            match fs::remove_file(path) {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
                _ => {}
            }
        }
        let [train_files, train_labels, val_files, val_labels] = paths;
        write_artifact(&train_files, &record.train_filenames)?;
        write_artifact(&train_labels, &record.train_labels)?;
        write_artifact(&val_files, &record.validation_filenames)?;
        write_artifact(&val_labels, &record.validation_labels)?;
        Ok(())
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `value` next to `path` and renames it into place, so a reader never
/// sees a partially written artifact.
fn write_artifact<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let staging = staging_path(path);
    let mut writer = BufWriter::new(File::create(&staging)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    drop(writer);
    fs::rename(&staging, path)?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// In-memory store, for harnesses that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemorySplitStore {
    record: Mutex<Option<SplitRecord>>,
}

impl MemorySplitStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `record`.
    #[must_use]
    pub fn with_record(record: SplitRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl SplitStore for MemorySplitStore {
    fn load(&self) -> Result<Option<SplitRecord>> {
        Ok(self
            .record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn store(&self, record: &SplitRecord) -> Result<()> {
        *self
            .record
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(record.clone());
        Ok(())
    }
}
