//! Label tables shipped with the RSNA and PhysioNet datasets.

use crate::{ensure_file, Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// RSNA subtype suffixes, in label-vector order. `any` is last.
pub const RSNA_SUBTYPES: [&str; 6] = [
    "epidural",
    "intraparenchymal",
    "intraventricular",
    "subarachnoid",
    "subdural",
    "any",
];

/// PhysioNet label columns, in label-vector order.
///
/// The last column is stored as `No_Hemorrhage` and inverted on load, so the
/// final label entry means "any hemorrhage" as in [`RSNA_SUBTYPES`].
pub const PHYSIONET_SUBTYPES: [&str; 6] = [
    "Epidural",
    "Intraparenchymal",
    "Intraventricular",
    "Subarachnoid",
    "Subdural",
    "No_Hemorrhage",
];

/// The RSNA `stage_2_train.csv` table: one `ID_<image>_<subtype>,<label>` row
/// per image and subtype.
#[derive(Debug, Clone, Default)]
pub struct RsnaLabelTable {
    entries: HashMap<String, f32>,
}

impl RsnaLabelTable {
    /// Reads the table from a CSV file.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the file does not exist, or a parse error
    /// for malformed rows.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_file(path)?;
        let table = Self::from_reader(BufReader::new(File::open(path)?))?;
        log::debug!("read {} label rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// Reads the table from CSV data with a header row.
    ///
    /// # Errors
    /// Returns an error if a row has fewer than two fields or a non-numeric label.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut entries = HashMap::new();
        for record in csv.records() {
            let record = record?;
            let (Some(key), Some(label)) = (record.get(0), record.get(1)) else {
                return Err(Error::InvalidFormat(format!(
                    "label row {:?} has fewer than two fields",
                    record.position().map(csv::Position::line)
                )));
            };
            let label: f32 = label.trim().parse().map_err(|_| {
                Error::InvalidFormat(format!("label for {key} is not a number: {label:?}"))
            })?;
            entries.insert(key.to_string(), label);
        }
        Ok(Self { entries })
    }

    /// Number of `(image, subtype)` rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a single `ID_<image>_<subtype>` key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f32> {
        self.entries.get(key).copied()
    }

    /// Returns the label vector of an image, ordered as [`RSNA_SUBTYPES`].
    ///
    /// # Errors
    /// Returns [`Error::MissingLabel`] naming the first absent key.
    pub fn labels_for(&self, image_id: &str) -> Result<[f32; 6]> {
        let mut labels = [0.0; 6];
        for (slot, subtype) in labels.iter_mut().zip(RSNA_SUBTYPES) {
            let key = format!("{image_id}_{subtype}");
            *slot = self.get(&key).ok_or(Error::MissingLabel { id: key })?;
        }
        Ok(labels)
    }
}

#[derive(Debug, Deserialize)]
struct PhysioNetRow {
    #[serde(rename = "PatientNumber")]
    patient: u32,
    #[serde(rename = "SliceNumber")]
    slice: u32,
    #[serde(rename = "Epidural")]
    epidural: f32,
    #[serde(rename = "Intraparenchymal")]
    intraparenchymal: f32,
    #[serde(rename = "Intraventricular")]
    intraventricular: f32,
    #[serde(rename = "Subarachnoid")]
    subarachnoid: f32,
    #[serde(rename = "Subdural")]
    subdural: f32,
    #[serde(rename = "No_Hemorrhage")]
    no_hemorrhage: f32,
}

/// The PhysioNet `hemorrhage_diagnosis_raw_ct.csv` table, keyed by
/// `(PatientNumber, SliceNumber)`. Slice numbers are 1-based.
#[derive(Debug, Clone, Default)]
pub struct PhysioNetLabelTable {
    rows: HashMap<(u32, u32), [f32; 6]>,
}

impl PhysioNetLabelTable {
    /// Reads the table from a CSV file.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if the file does not exist, or a parse error
    /// if a required column is missing or non-numeric.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_file(path)?;
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Reads the table from CSV data with a header row. Unknown columns are ignored.
    ///
    /// # Errors
    /// Returns a CSV error if a row cannot be deserialized.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let mut rows = HashMap::new();
        for row in csv.deserialize::<PhysioNetRow>() {
            let row = row?;
            rows.insert(
                (row.patient, row.slice),
                [
                    row.epidural,
                    row.intraparenchymal,
                    row.intraventricular,
                    row.subarachnoid,
                    row.subdural,
                    1.0 - row.no_hemorrhage,
                ],
            );
        }
        Ok(Self { rows })
    }

    /// Number of labelled slices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Label vector for a patient's 1-based slice number.
    ///
    /// # Errors
    /// Returns [`Error::MissingLabel`] if the slice has no row.
    pub fn labels_for(&self, patient: u32, slice: u32) -> Result<[f32; 6]> {
        self.rows
            .get(&(patient, slice))
            .copied()
            .ok_or_else(|| Error::MissingLabel {
                id: format!("patient {patient:03}, slice {slice}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const RSNA_CSV: &str = "\
ID,Label
ID_12cadc6af_epidural,0
ID_12cadc6af_intraparenchymal,1
ID_12cadc6af_intraventricular,0
ID_12cadc6af_subarachnoid,0
ID_12cadc6af_subdural,1
ID_12cadc6af_any,1
ID_38fd7baa0_epidural,0
";

    #[test]
    fn test_rsna_labels_in_subtype_order() {
        let table = RsnaLabelTable::from_reader(RSNA_CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(
            table.labels_for("ID_12cadc6af").unwrap(),
            [0.0, 1.0, 0.0, 0.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_rsna_incomplete_image_is_missing_label() {
        let table = RsnaLabelTable::from_reader(RSNA_CSV.as_bytes()).unwrap();
        let err = table.labels_for("ID_38fd7baa0").unwrap_err();
        assert!(matches!(err, Error::MissingLabel { id } if id == "ID_38fd7baa0_intraparenchymal"));
        assert!(table.labels_for("ID_ffffffff0").is_err());
    }

    #[test]
    fn test_rsna_non_numeric_label() {
        let csv = "ID,Label\nID_1_epidural,yes\n";
        let result = RsnaLabelTable::from_reader(csv.as_bytes());
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_rsna_missing_file() {
        let result = RsnaLabelTable::from_path("/nonexistent/stage_2_train.csv");
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_physionet_any_is_inverted_no_hemorrhage() {
        let csv = "\
PatientNumber,SliceNumber,Intraventricular,Intraparenchymal,Subarachnoid,Epidural,Subdural,No_Hemorrhage,Fracture_Yes_No
49,1,0,0,0,0,0,1,0
49,2,0,1,0,0,1,0,1
";
        let table = PhysioNetLabelTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);

        let healthy = table.labels_for(49, 1).unwrap();
        assert_abs_diff_eq!(healthy[5], 0.0);

        let bleed = table.labels_for(49, 2).unwrap();
        assert_eq!(bleed, [0.0, 1.0, 0.0, 0.0, 1.0, 1.0]);

        assert!(matches!(
            table.labels_for(50, 1),
            Err(Error::MissingLabel { .. })
        ));
    }
}
