//! PhysioNet CT-ICH volumes with segmentation masks.
//!
//! The dataset root holds:
//!
//! ```text
//! root/
//! ├── ct_scans/049.nii       one volume per patient, [x, y, slice]
//! ├── masks/049.nii          same name, same shape
//! └── hemorrhage_diagnosis_raw_ct.csv
//! ```
//!
//! Every volume is flattened into its slices at load time; sample `i` is
//! the `i`-th slice over all patients in file-name order.

use crate::error::{Error, Result};
use crate::{check_index, Dataset, Transform};
use hemopix_core::{CalibrationParams, RawVolume, Rotation, WindowSpec, WindowedTensor};
use hemopix_io::{list_files, read_3d, PhysioNetLabelTable};
use ndarray::{Array1, Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;

/// Scan volumes, relative to the dataset root.
pub const SCANS_DIR: &str = "ct_scans";
/// Mask volumes, relative to the dataset root.
pub const MASKS_DIR: &str = "masks";
/// Per-slice diagnosis table, relative to the dataset root.
pub const LABELS_CSV: &str = "hemorrhage_diagnosis_raw_ct.csv";

/// One windowed slice, its mask and its label vector.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysioNetSample {
    /// `(1 + windows, rows, cols)`; channel 0 is the fixed brain window.
    pub image: Array3<f32>,
    /// `(rows, cols)`, scaled to `[0, 1]` when not all zero.
    pub mask: Array2<f32>,
    /// Subtype indicators, "any hemorrhage" last.
    pub label: Array1<f32>,
}

/// A scan/mask pair for one patient.
#[derive(Debug, Clone)]
struct PatientVolume {
    scan: RawVolume,
    mask: RawVolume,
}

/// PhysioNet slices held in memory.
#[derive(Clone)]
pub struct PhysioNetDataset {
    volumes: Vec<PatientVolume>,
    // (volume, slice) per sample
    index: Vec<(usize, usize)>,
    labels: Array2<f32>,
    windows: Vec<WindowSpec>,
    transform: Option<Transform>,
}

impl std::fmt::Debug for PhysioNetDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysioNetDataset")
            .field("patients", &self.volumes.len())
            .field("slices", &self.index.len())
            .field("windows", &self.windows)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

impl PhysioNetDataset {
    /// Loads every patient under `root`, rotating slices counter-clockwise.
    ///
    /// # Errors
    /// See [`PhysioNetDataset::open_with_rotation`].
    pub fn open<P: AsRef<Path>>(root: P, windows: Vec<WindowSpec>) -> Result<Self> {
        Self::open_with_rotation(root, windows, Rotation::CounterClockwise)
    }

    /// Loads every patient under `root` with an explicit slice rotation.
    ///
    /// Volumes are read in parallel; scans and masks share `rotation`.
    ///
    /// # Errors
    /// - `NotFound` if the scan directory, a mask or the label table is missing
    /// - [`Error::InvalidFilename`] if a scan name is not a patient number
    /// - [`Error::MaskShape`] if a mask does not match its scan
    /// - `MissingLabel` if a slice has no diagnosis row
    pub fn open_with_rotation<P: AsRef<Path>>(
        root: P,
        windows: Vec<WindowSpec>,
        rotation: Rotation,
    ) -> Result<Self> {
        let root = root.as_ref();
        let scans_dir = root.join(SCANS_DIR);
        let masks_dir = root.join(MASKS_DIR);
        let table = PhysioNetLabelTable::from_path(root.join(LABELS_CSV))?;

        let filenames = list_files(&scans_dir, None)?;
        let patients = filenames
            .iter()
            .map(|name| patient_number(name))
            .collect::<Result<Vec<u32>>>()?;

        let volumes = filenames
            .par_iter()
            .map(|name| load_pair(&scans_dir.join(name), &masks_dir.join(name), rotation))
            .collect::<Result<Vec<(RawVolume, RawVolume)>>>()?;

        let volumes = patients
            .into_iter()
            .zip(volumes)
            .map(|(patient, (scan, mask))| (patient, scan, mask))
            .collect();
        let dataset = Self::from_volumes(volumes, &table, windows)?;
        log::info!(
            "loaded {} PhysioNet slices from {} patients under {}",
            dataset.len(),
            dataset.patients(),
            root.display()
        );
        Ok(dataset)
    }

    /// Builds a dataset from already-loaded `(patient, scan, mask)` volumes.
    ///
    /// Slice `z` of a patient is labelled by table row `(patient, z + 1)`.
    ///
    /// # Errors
    /// Returns [`Error::MaskShape`] for mismatched volumes or `MissingLabel`
    /// for an unlabelled slice.
    pub fn from_volumes(
        volumes: Vec<(u32, RawVolume, RawVolume)>,
        table: &PhysioNetLabelTable,
        windows: Vec<WindowSpec>,
    ) -> Result<Self> {
        let total: usize = volumes.iter().map(|(_, scan, _)| scan.len_of(Axis(2))).sum();
        let mut index = Vec::with_capacity(total);
        let mut labels = Array2::<f32>::zeros((total, PHYSIONET_LABELS));
        let mut pairs = Vec::with_capacity(volumes.len());

        for (v, (patient, scan, mask)) in volumes.into_iter().enumerate() {
            if scan.dim() != mask.dim() {
                return Err(Error::MaskShape {
                    name: format!("patient {patient:03}"),
                    scan: scan.dim(),
                    mask: mask.dim(),
                });
            }
            for (z, slice_number) in (0..scan.len_of(Axis(2))).zip(1_u32..) {
                let row = table.labels_for(patient, slice_number)?;
                labels
                    .row_mut(index.len())
                    .assign(&ArrayView1::from(&row[..]));
                index.push((v, z));
            }
            pairs.push(PatientVolume { scan, mask });
        }

        Ok(Self {
            volumes: pairs,
            index,
            labels,
            windows,
            transform: None,
        })
    }

    /// Set a transform applied to every windowed image and, as a
    /// single-channel tensor, to its mask.
    ///
    /// The transform must preserve the channel count.
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Array3<f32>) -> Array3<f32> + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Number of patients.
    #[must_use]
    pub fn patients(&self) -> usize {
        self.volumes.len()
    }

    /// Label matrix, one row per slice.
    #[must_use]
    pub fn labels(&self) -> &Array2<f32> {
        &self.labels
    }

    /// Extra windows stacked after the fixed brain window.
    #[must_use]
    pub fn windows(&self) -> &[WindowSpec] {
        &self.windows
    }
}

const PHYSIONET_LABELS: usize = hemopix_io::PHYSIONET_SUBTYPES.len();

impl Dataset for PhysioNetDataset {
    type Sample = PhysioNetSample;

    fn len(&self) -> usize {
        self.index.len()
    }

    fn get(&self, index: usize) -> Result<PhysioNetSample> {
        check_index(index, self.len())?;
        let (v, z) = self.index[index];
        let volume = &self.volumes[v];

        let slice = volume.scan.index_axis(Axis(2), z);
        let mut image =
            WindowedTensor::build(&slice, &CalibrationParams::FIXED_BRAIN, &self.windows)
                .into_array();
        let mut mask = normalize_mask(volume.mask.index_axis(Axis(2), z).to_owned());

        if let Some(transform) = &self.transform {
            image = transform(image);
            let transformed = transform(mask.insert_axis(Axis(0)));
            if transformed.len_of(Axis(0)) != 1 {
                return Err(hemopix_core::Error::ShapeMismatch(format!(
                    "mask transform returned {} channels, expected 1",
                    transformed.len_of(Axis(0))
                ))
                .into());
            }
            mask = transformed.index_axis_move(Axis(0), 0);
        }

        Ok(PhysioNetSample {
            image,
            mask,
            label: self.labels.row(index).to_owned(),
        })
    }
}

/// Patient number encoded in a volume file name (`049.nii.gz` → 49).
///
/// # Errors
/// Returns [`Error::InvalidFilename`] if the stem is not a number.
pub fn patient_number(filename: &str) -> Result<u32> {
    let stem = filename.split_once('.').map_or(filename, |(stem, _)| stem);
    stem.parse()
        .map_err(|_| Error::InvalidFilename(filename.to_string()))
}

/// Rescales a mask to `[0, 1]` by its own range. Masks that are all zero
/// or constant are returned unchanged.
#[must_use]
pub fn normalize_mask(mut mask: Array2<f32>) -> Array2<f32> {
    let (min, max) = mask
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if max > 0.0 && max > min {
        let span = max - min;
        mask.mapv_inplace(|v| (v - min) / span);
    }
    mask
}

fn load_pair(scan: &Path, mask: &Path, rotation: Rotation) -> Result<(RawVolume, RawVolume)> {
    let scan_volume = read_3d(scan, rotation)?;
    let mask_volume = read_3d(mask, rotation)?;
    if scan_volume.dim() != mask_volume.dim() {
        return Err(Error::MaskShape {
            name: mask.display().to_string(),
            scan: scan_volume.dim(),
            mask: mask_volume.dim(),
        });
    }
    Ok((scan_volume, mask_volume))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s};

    const LABELS: &str = "\
PatientNumber,SliceNumber,Intraventricular,Intraparenchymal,Subarachnoid,Epidural,Subdural,No_Hemorrhage
49,1,0,0,0,0,0,1
49,2,0,1,0,0,0,0
50,1,0,0,0,1,0,0
";

    fn table() -> PhysioNetLabelTable {
        PhysioNetLabelTable::from_reader(LABELS.as_bytes()).unwrap()
    }

    fn volumes() -> Vec<(u32, RawVolume, RawVolume)> {
        let mut scan49 = RawVolume::zeros((2, 3, 2));
        scan49.slice_mut(s![.., .., 1]).fill(100.0);
        let mut mask49 = RawVolume::zeros((2, 3, 2));
        mask49[[0, 0, 1]] = 255.0;
        let scan50 = RawVolume::from_elem((2, 3, 1), -1000.0);
        let mask50 = RawVolume::zeros((2, 3, 1));
        vec![(49, scan49, mask49), (50, scan50, mask50)]
    }

    #[test]
    fn test_patient_number() {
        assert_eq!(patient_number("049.nii").unwrap(), 49);
        assert_eq!(patient_number("130.nii.gz").unwrap(), 130);
        assert!(matches!(
            patient_number("scan_a.nii"),
            Err(Error::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_normalize_mask() {
        let mask = normalize_mask(array![[0.0, 255.0], [0.0, 0.0]]);
        assert_eq!(mask, array![[0.0, 1.0], [0.0, 0.0]]);

        let blank = normalize_mask(Array2::zeros((2, 2)));
        assert_eq!(blank, Array2::<f32>::zeros((2, 2)));

        let constant = normalize_mask(Array2::from_elem((2, 2), 3.0));
        assert_eq!(constant, Array2::from_elem((2, 2), 3.0_f32));

        // Values between the extremes scale linearly
        let graded = normalize_mask(array![[-1.0, 0.0], [1.0, 3.0]]);
        for (&got, expected) in graded.iter().zip([0.0_f32, 0.25, 0.5, 1.0]) {
            assert_abs_diff_eq!(got, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_slices_flattened_in_patient_order() {
        let ds = PhysioNetDataset::from_volumes(volumes(), &table(), Vec::new()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.patients(), 2);

        // 50/1 is epidural, column 0
        let last = ds.get(2).unwrap();
        assert_eq!(last.label, array![1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_get_windows_and_normalizes() {
        let ds =
            PhysioNetDataset::from_volumes(volumes(), &table(), vec![WindowSpec::SUBDURAL]).unwrap();
        let sample = ds.get(1).unwrap();

        assert_eq!(sample.image.dim(), (2, 2, 3));
        // 100 HU is the top of the 40/120 window
        assert_abs_diff_eq!(sample.image[[0, 0, 0]], 1.0);
        // 100 HU in the 80/200 window: (100 - -20) / 200
        assert_abs_diff_eq!(sample.image[[1, 0, 0]], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(sample.mask[[0, 0]], 1.0);
        assert_abs_diff_eq!(sample.mask.sum(), 1.0);
        assert_eq!(sample.label, array![0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

        let healthy = ds.get(0).unwrap();
        assert_abs_diff_eq!(healthy.label[5], 0.0);
    }

    #[test]
    fn test_missing_label_row() {
        let mut vols = volumes();
        vols.push((51, RawVolume::zeros((2, 3, 1)), RawVolume::zeros((2, 3, 1))));
        let err = PhysioNetDataset::from_volumes(vols, &table(), Vec::new()).unwrap_err();
        assert!(err.is_missing_label());
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let vols = vec![(49, RawVolume::zeros((2, 3, 2)), RawVolume::zeros((3, 2, 2)))];
        let err = PhysioNetDataset::from_volumes(vols, &table(), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::MaskShape { .. }));
    }

    #[test]
    fn test_transform_applies_to_mask() {
        let ds = PhysioNetDataset::from_volumes(volumes(), &table(), Vec::new())
            .unwrap()
            .with_transform(|t| t.slice(s![.., ..1, ..1]).to_owned());
        let sample = ds.get(1).unwrap();
        assert_eq!(sample.image.dim(), (1, 1, 1));
        assert_eq!(sample.mask.dim(), (1, 1));
        assert_abs_diff_eq!(sample.mask[[0, 0]], 1.0);
    }

    #[test]
    fn test_channel_changing_transform_rejected_for_mask() {
        let ds = PhysioNetDataset::from_volumes(volumes(), &table(), Vec::new())
            .unwrap()
            .with_transform(|t| ndarray::concatenate![Axis(0), t, t]);
        assert!(matches!(
            ds.get(0),
            Err(Error::Core(hemopix_core::Error::ShapeMismatch(_)))
        ));
    }

    #[test]
    fn test_open_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let err = PhysioNetDataset::open(dir.path(), Vec::new()).unwrap_err();
        assert!(err.is_not_found());
    }
}
