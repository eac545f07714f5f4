//! hemopix-python: PyO3 Python bindings for hemopix.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::elidable_lifetime_names,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
//!
//! Exposes the readers, the windowing engine, the split builder and the
//! dataset adapters to the Python training harness. Arrays cross the
//! boundary as `float32` numpy arrays.

use hemopix_core::{CalibrationParams, Rotation, SplitRecord, WindowSpec};
use hemopix_dataset::{Dataset, PhysioNetDataset, RsnaDataset};
use numpy::{IntoPyArray, PyArray1, PyArray2, PyArray3, PyReadonlyArray2};
use pyo3::exceptions::{
    PyFileNotFoundError, PyIOError, PyIndexError, PyKeyError, PyValueError,
};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(format!("{context}: {err}"))
}

fn core_error(context: &str, err: &hemopix_core::Error) -> PyErr {
    match err {
        hemopix_core::Error::IndexOutOfRange { .. } => {
            PyIndexError::new_err(format!("{context}: {err}"))
        }
        _ => value_error(context, err),
    }
}

fn hemopix_io_error(context: &str, err: &hemopix_io::Error) -> PyErr {
    match err {
        hemopix_io::Error::NotFound { .. } => {
            PyFileNotFoundError::new_err(format!("{context}: {err}"))
        }
        hemopix_io::Error::MissingLabel { .. } => PyKeyError::new_err(format!("{context}: {err}")),
        hemopix_io::Error::MalformedCalibration { .. } | hemopix_io::Error::InvalidFormat(_) => {
            value_error(context, err)
        }
        hemopix_io::Error::CoreError(inner) => core_error(context, inner),
        _ => io_error(context, err),
    }
}

fn dataset_error(context: &str, err: &hemopix_dataset::Error) -> PyErr {
    match err {
        hemopix_dataset::Error::Io(inner) => hemopix_io_error(context, inner),
        hemopix_dataset::Error::Core(inner) => core_error(context, inner),
        _ => value_error(context, err),
    }
}

fn parse_rotation(rotation: &str) -> PyResult<Rotation> {
    match rotation {
        "none" => Ok(Rotation::None),
        "counter_clockwise" | "ccw" => Ok(Rotation::CounterClockwise),
        "clockwise" | "cw" => Ok(Rotation::Clockwise),
        other => Err(PyValueError::new_err(format!(
            "unknown rotation {other:?} (expected none, counter_clockwise or clockwise)"
        ))),
    }
}

fn window_specs(context: &str, windows: Option<Vec<(i32, i32)>>) -> PyResult<Vec<WindowSpec>> {
    windows
        .unwrap_or_default()
        .into_iter()
        .map(|pair| WindowSpec::try_from(pair).map_err(|e| value_error(context, e)))
        .collect()
}

/// Resolves a Python index, counting negative values from the end.
fn resolve_index(index: isize, len: usize) -> PyResult<usize> {
    let resolved = if index < 0 {
        len.checked_sub(index.unsigned_abs())
    } else {
        Some(index as usize)
    };
    resolved
        .filter(|&i| i < len)
        .ok_or_else(|| PyIndexError::new_err(format!("index {index} out of range for length {len}")))
}

fn calibration_dict<'py>(
    py: Python<'py>,
    calibration: &CalibrationParams,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("window_center", calibration.center())?;
    dict.set_item("window_width", calibration.width())?;
    dict.set_item("intercept", calibration.intercept())?;
    dict.set_item("slope", calibration.slope())?;
    Ok(dict)
}

/// Read a 2D DICOM slice.
///
/// Returns `(image, calibration)` where `image` holds stored values and
/// `calibration` is a dict of `window_center`, `window_width`,
/// `intercept` and `slope`.
#[pyfunction]
fn read_2d<'py>(
    py: Python<'py>,
    path: &str,
) -> PyResult<(Bound<'py, PyArray2<f32>>, Bound<'py, PyDict>)> {
    let (image, calibration) =
        hemopix_io::read_2d(path).map_err(|e| hemopix_io_error(&format!("read_2d: {path}"), &e))?;
    Ok((image.into_pyarray(py), calibration_dict(py, &calibration)?))
}

/// Read a 3D NIfTI volume as `[x, y, slice]`.
#[pyfunction]
#[pyo3(signature = (path, rotation="none"))]
fn read_3d<'py>(py: Python<'py>, path: &str, rotation: &str) -> PyResult<Bound<'py, PyArray3<f32>>> {
    let rotation = parse_rotation(rotation)?;
    let volume = hemopix_io::read_3d(path, rotation)
        .map_err(|e| hemopix_io_error(&format!("read_3d: {path}"), &e))?;
    Ok(volume.into_pyarray(py))
}

/// Window a stored-value image into `[0, 1]`.
#[pyfunction]
#[pyo3(signature = (image, center, width, intercept=0, slope=1))]
fn apply_window<'py>(
    py: Python<'py>,
    image: PyReadonlyArray2<'py, f32>,
    center: i32,
    width: i32,
    intercept: i32,
    slope: i32,
) -> PyResult<Bound<'py, PyArray2<f32>>> {
    let window = WindowSpec::new(center, width).map_err(|e| value_error("apply_window", e))?;
    let windowed = hemopix_core::apply_window(&image.as_array(), window, intercept, slope);
    Ok(windowed.into_pyarray(py))
}

/// Stack one windowed channel per `(center, width)` pair.
#[pyfunction]
#[pyo3(signature = (image, windows, intercept=0, slope=1))]
fn build_channels<'py>(
    py: Python<'py>,
    image: PyReadonlyArray2<'py, f32>,
    windows: Vec<(i32, i32)>,
    intercept: i32,
    slope: i32,
) -> PyResult<Bound<'py, PyArray3<f32>>> {
    let windows = window_specs("build_channels", Some(windows))?;
    let channels = hemopix_core::build_channels(&image.as_array(), &windows, intercept, slope);
    Ok(channels.into_pyarray(py))
}

fn split_dict<'py>(py: Python<'py>, record: SplitRecord) -> PyResult<Bound<'py, PyDict>> {
    let SplitRecord {
        train_filenames,
        train_labels,
        validation_filenames,
        validation_labels,
    } = record;
    let dict = PyDict::new(py);
    dict.set_item("train_filenames", train_filenames)?;
    dict.set_item("train_labels", train_labels.into_pyarray(py))?;
    dict.set_item("validation_filenames", validation_filenames)?;
    dict.set_item("validation_labels", validation_labels.into_pyarray(py))?;
    Ok(dict)
}

/// Build (or load) the RSNA train/validation split stored under `root`.
#[pyfunction]
#[pyo3(signature = (root, validation_fraction=0.05, seed=42, force_rebuild=false))]
fn build_split<'py>(
    py: Python<'py>,
    root: &str,
    validation_fraction: f64,
    seed: u64,
    force_rebuild: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let record = py
        .allow_threads(|| {
            hemopix_dataset::build_split(root, validation_fraction, seed, force_rebuild)
        })
        .map_err(|e| dataset_error(&format!("build_split: {root}"), &e))?;
    split_dict(py, record)
}

/// RSNA slices yielding `(image, label)` numpy pairs.
#[pyclass(name = "RsnaDataset")]
pub struct PyRsnaDataset {
    inner: RsnaDataset,
}

#[pymethods]
impl PyRsnaDataset {
    #[new]
    #[pyo3(signature = (root, filenames, labels, windows=None))]
    fn new(
        root: &str,
        filenames: Vec<String>,
        labels: PyReadonlyArray2<'_, f32>,
        windows: Option<Vec<(i32, i32)>>,
    ) -> PyResult<Self> {
        let windows = window_specs("RsnaDataset", windows)?;
        let inner = RsnaDataset::new(root, filenames, labels.as_array().to_owned(), windows)
            .map_err(|e| dataset_error("RsnaDataset", &e))?;
        Ok(Self { inner })
    }

    /// Build (or load) the split and return `(train, validation)` datasets.
    #[staticmethod]
    #[pyo3(signature = (root, windows=None, validation_fraction=0.05, seed=42, force_rebuild=false))]
    fn from_split(
        py: Python<'_>,
        root: &str,
        windows: Option<Vec<(i32, i32)>>,
        validation_fraction: f64,
        seed: u64,
        force_rebuild: bool,
    ) -> PyResult<(Self, Self)> {
        let windows = window_specs("RsnaDataset.from_split", windows)?;
        let (train, validation) = py
            .allow_threads(|| {
                let record =
                    hemopix_dataset::build_split(root, validation_fraction, seed, force_rebuild)?;
                RsnaDataset::from_split(root, &record, &windows)
            })
            .map_err(|e| dataset_error(&format!("RsnaDataset.from_split: {root}"), &e))?;
        Ok((Self { inner: train }, Self { inner: validation }))
    }

    #[getter]
    fn filenames(&self) -> Vec<String> {
        self.inner.filenames().to_vec()
    }

    #[getter]
    fn labels<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f32>> {
        self.inner.labels().clone().into_pyarray(py)
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __getitem__<'py>(
        &self,
        py: Python<'py>,
        index: isize,
    ) -> PyResult<(Bound<'py, PyArray3<f32>>, Bound<'py, PyArray1<f32>>)> {
        let index = resolve_index(index, self.inner.len())?;
        let sample = py
            .allow_threads(|| self.inner.get(index))
            .map_err(|e| dataset_error("RsnaDataset", &e))?;
        Ok((sample.image.into_pyarray(py), sample.label.into_pyarray(py)))
    }

    fn __repr__(&self) -> String {
        format!(
            "RsnaDataset(len={}, windows={})",
            self.inner.len(),
            self.inner.windows().len()
        )
    }
}

type PhysioNetItem<'py> = (
    Bound<'py, PyArray3<f32>>,
    Bound<'py, PyArray2<f32>>,
    Bound<'py, PyArray1<f32>>,
);

/// PhysioNet slices yielding `(image, mask, label)` numpy triples.
#[pyclass(name = "PhysioNetDataset")]
pub struct PyPhysioNetDataset {
    inner: PhysioNetDataset,
}

#[pymethods]
impl PyPhysioNetDataset {
    #[new]
    #[pyo3(signature = (root, windows=None, rotation="counter_clockwise"))]
    fn new(
        py: Python<'_>,
        root: &str,
        windows: Option<Vec<(i32, i32)>>,
        rotation: &str,
    ) -> PyResult<Self> {
        let windows = window_specs("PhysioNetDataset", windows)?;
        let rotation = parse_rotation(rotation)?;
        let inner = py
            .allow_threads(|| PhysioNetDataset::open_with_rotation(root, windows, rotation))
            .map_err(|e| dataset_error(&format!("PhysioNetDataset: {root}"), &e))?;
        Ok(Self { inner })
    }

    #[getter]
    fn labels<'py>(&self, py: Python<'py>) -> Bound<'py, PyArray2<f32>> {
        self.inner.labels().clone().into_pyarray(py)
    }

    #[getter]
    fn patients(&self) -> usize {
        self.inner.patients()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __getitem__<'py>(&self, py: Python<'py>, index: isize) -> PyResult<PhysioNetItem<'py>> {
        let index = resolve_index(index, self.inner.len())?;
        let sample = self
            .inner
            .get(index)
            .map_err(|e| dataset_error("PhysioNetDataset", &e))?;
        Ok((
            sample.image.into_pyarray(py),
            sample.mask.into_pyarray(py),
            sample.label.into_pyarray(py),
        ))
    }

    fn __repr__(&self) -> String {
        format!(
            "PhysioNetDataset(len={}, patients={}, windows={})",
            self.inner.len(),
            self.inner.patients(),
            self.inner.windows().len()
        )
    }
}

#[pymodule]
fn hemopix(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRsnaDataset>()?;
    m.add_class::<PyPhysioNetDataset>()?;
    m.add_function(wrap_pyfunction!(read_2d, m)?)?;
    m.add_function(wrap_pyfunction!(read_3d, m)?)?;
    m.add_function(wrap_pyfunction!(apply_window, m)?)?;
    m.add_function(wrap_pyfunction!(build_channels, m)?)?;
    m.add_function(wrap_pyfunction!(build_split, m)?)?;
    Ok(())
}
