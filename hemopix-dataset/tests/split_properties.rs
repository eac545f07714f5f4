//! Split builder properties over on-disk RSNA layouts.

use hemopix_dataset::split::{RSNA_LABELS_CSV, RSNA_TRAIN_DIR};
use hemopix_dataset::{build_split, SplitBuilder, SplitConfig, CORRUPTED_FILES};
use hemopix_io::{FileSplitStore, MemorySplitStore, SplitStore, RSNA_SUBTYPES};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::{self, File};
use tempfile::TempDir;

/// Creates `n` empty slices plus the denylisted one, all labelled.
/// Every third slice is positive for `subdural` and `any`.
fn rsna_root(n: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let train = dir.path().join(RSNA_TRAIN_DIR);
    fs::create_dir(&train).unwrap();

    let mut ids: Vec<String> = (0..n).map(|i| format!("ID_{i:09x}")).collect();
    ids.push(CORRUPTED_FILES[0].trim_end_matches(".dcm").to_string());

    let mut csv = String::from("ID,Label\n");
    for (i, id) in ids.iter().enumerate() {
        File::create(train.join(format!("{id}.dcm"))).unwrap();
        let positive = i % 3 == 0;
        for subtype in RSNA_SUBTYPES {
            let label = u8::from(positive && (subtype == "subdural" || subtype == "any"));
            writeln!(csv, "{id}_{subtype},{label}").unwrap();
        }
    }
    fs::write(dir.path().join(RSNA_LABELS_CSV), csv).unwrap();
    dir
}

fn names(files: &[String]) -> HashSet<&str> {
    files.iter().map(String::as_str).collect()
}

#[test]
fn test_subsets_are_disjoint_and_cover_all_files() {
    let root = rsna_root(200);
    let record = build_split(root.path(), 0.1, 42, true).unwrap();

    let train = names(&record.train_filenames);
    let val = names(&record.validation_filenames);
    assert!(train.is_disjoint(&val));
    assert_eq!(train.len() + val.len(), 200);
    assert_eq!(val.len(), 20);
    assert_eq!(record.train_labels.nrows(), train.len());
    assert_eq!(record.validation_labels.ncols(), RSNA_SUBTYPES.len());

    for corrupted in CORRUPTED_FILES {
        assert!(!train.contains(corrupted));
        assert!(!val.contains(corrupted));
    }
}

#[test]
fn test_labels_follow_their_files() {
    let root = rsna_root(30);
    let record = build_split(root.path(), 0.2, 1, true).unwrap();

    let all = record
        .train_filenames
        .iter()
        .zip(record.train_labels.rows())
        .chain(
            record
                .validation_filenames
                .iter()
                .zip(record.validation_labels.rows()),
        );
    for (name, row) in all {
        let index = usize::from_str_radix(&name[3..12], 16).unwrap();
        let expected = if index % 3 == 0 { 1.0 } else { 0.0 };
        assert_eq!(row[4], expected, "{name}");
        assert_eq!(row[5], expected, "{name}");
        assert_eq!(row[0], 0.0, "{name}");
    }
}

#[test]
fn test_same_seed_same_split() {
    let root = rsna_root(120);
    let first = build_split(root.path(), 0.05, 42, true).unwrap();
    let second = build_split(root.path(), 0.05, 42, true).unwrap();
    assert_eq!(first, second);

    let other = build_split(root.path(), 0.05, 43, true).unwrap();
    assert_ne!(first.validation_filenames, other.validation_filenames);
}

#[test]
fn test_validation_size_is_floor_of_fraction() {
    let root = rsna_root(1000);
    let record = build_split(root.path(), 0.05, 42, true).unwrap();
    assert_eq!(record.validation_filenames.len(), 50);
    assert_eq!(record.train_filenames.len(), 950);
}

#[test]
fn test_stored_split_is_reused() {
    let root = rsna_root(40);
    let built = build_split(root.path(), 0.25, 42, false).unwrap();
    assert!(FileSplitStore::new(root.path()).is_complete());

    // The label table is no longer needed once the split is stored
    fs::remove_file(root.path().join(RSNA_LABELS_CSV)).unwrap();
    let loaded = build_split(root.path(), 0.25, 42, false).unwrap();
    assert_eq!(built, loaded);

    // A stored split wins over different parameters unless rebuilt
    let stale = build_split(root.path(), 0.5, 7, false).unwrap();
    assert_eq!(stale, built);
    let err = build_split(root.path(), 0.5, 7, true).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_stored_split_ignores_fraction_unless_rebuilt() {
    let root = rsna_root(40);
    let built = build_split(root.path(), 0.25, 42, false).unwrap();

    let loaded = build_split(root.path(), 1.5, 42, false).unwrap();
    assert_eq!(loaded, built);

    let err = build_split(root.path(), 1.5, 42, true).unwrap_err();
    assert!(matches!(
        err,
        hemopix_dataset::Error::Core(hemopix_core::Error::InvalidFraction(_))
    ));
}

#[test]
fn test_missing_label_fails() {
    let root = rsna_root(10);
    File::create(root.path().join(RSNA_TRAIN_DIR).join("ID_unlabeled.dcm")).unwrap();

    let err = build_split(root.path(), 0.1, 42, true).unwrap_err();
    assert!(err.is_missing_label());
    assert!(err.to_string().contains("ID_unlabeled_epidural"));
}

#[test]
fn test_missing_train_dir() {
    let dir = tempfile::tempdir().unwrap();
    let err = build_split(dir.path(), 0.05, 42, false).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_only_dicom_files_are_listed() {
    let root = rsna_root(20);
    let train = root.path().join(RSNA_TRAIN_DIR);
    fs::write(train.join("README.txt"), "not a slice").unwrap();
    fs::create_dir(train.join("ID_subdir.dcm")).unwrap();

    let record = build_split(root.path(), 0.1, 42, true).unwrap();
    assert_eq!(record.len(), 20);
}

#[test]
fn test_memory_store_builder() {
    let root = rsna_root(50);
    let builder = SplitBuilder::with_store(root.path(), MemorySplitStore::new())
        .with_config(SplitConfig::default().with_validation_fraction(0.2).with_seed(9));

    assert!(builder.store().load().unwrap().is_none());
    let record = builder.build(false).unwrap();
    assert_eq!(builder.store().load().unwrap().as_ref(), Some(&record));
    assert_eq!(record.validation_filenames.len(), 10);

    // Nothing is written to the dataset root
    assert!(!FileSplitStore::new(root.path()).is_complete());
}

#[test]
fn test_compute_matches_build() {
    let root = rsna_root(64);
    let builder = SplitBuilder::new(root.path());
    let computed = builder.compute().unwrap();
    let built = builder.build(true).unwrap();
    assert_eq!(computed, built);
    assert!(builder.store().is_complete());
}
