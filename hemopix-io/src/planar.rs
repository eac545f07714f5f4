//! 2D DICOM slice reader.

use crate::{ensure_file, Error, Result};
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{open_file, InMemDicomObject};
use dicom_pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use hemopix_core::{CalibrationParams, CalibrationValue, RawImage};
use std::path::Path;

/// Calibration tags in `(center, width, intercept, slope)` order.
const CALIBRATION_TAGS: [(Tag, &str); 4] = [
    (tags::WINDOW_CENTER, "WindowCenter (0028,1050)"),
    (tags::WINDOW_WIDTH, "WindowWidth (0028,1051)"),
    (tags::RESCALE_INTERCEPT, "RescaleIntercept (0028,1052)"),
    (tags::RESCALE_SLOPE, "RescaleSlope (0028,1053)"),
];

/// Reads a DICOM slice and its embedded calibration.
///
/// Pixel values are returned as stored; the rescale slope and intercept are
/// reported in the calibration and applied later by the windowing engine.
/// Only the first frame of multi-frame objects is returned.
///
/// # Errors
/// - [`Error::NotFound`] if `path` is not an existing file
/// - [`Error::MalformedCalibration`] if a calibration tag is absent or unparseable
/// - [`Error::Dicom`] if the file cannot be parsed or its pixel data decoded
pub fn read_2d<P: AsRef<Path>>(path: P) -> Result<(RawImage, CalibrationParams)> {
    let path = path.as_ref();
    ensure_file(path)?;

    let object = open_file(path).map_err(|e| dicom_error(path, e))?;
    let calibration = calibration_from_object(&object, path)?;

    let decoded = object
        .decode_pixel_data()
        .map_err(|e| dicom_error(path, e))?;
    let rows = decoded.rows() as usize;
    let cols = decoded.columns() as usize;
    let options = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let mut values: Vec<f32> = decoded
        .to_vec_with_options(&options)
        .map_err(|e| dicom_error(path, e))?;

    let frame_len = rows * cols;
    if values.len() < frame_len {
        return Err(Error::InvalidFormat(format!(
            "{}: {} pixel values for a {rows}x{cols} frame",
            path.display(),
            values.len()
        )));
    }
    values.truncate(frame_len);

    let image = RawImage::from_shape_vec((rows, cols), values)
        .map_err(|e| Error::InvalidFormat(format!("{}: {e}", path.display())))?;
    log::debug!(
        "read {} ({rows}x{cols}, window {}/{}, rescale {}x+{})",
        path.display(),
        calibration.center(),
        calibration.width(),
        calibration.slope(),
        calibration.intercept()
    );
    Ok((image, calibration))
}

/// Extracts window center/width and rescale intercept/slope from a DICOM object.
///
/// Each tag may hold one value or several; the first is used. Decimal values
/// are truncated toward zero. `path` is only used for error reporting.
///
/// # Errors
/// Returns [`Error::MalformedCalibration`] if any tag is missing, unparseable,
/// or yields a non-positive window width.
pub fn calibration_from_object(object: &InMemDicomObject, path: &Path) -> Result<CalibrationParams> {
    let [center, width, intercept, slope] =
        CALIBRATION_TAGS.map(|(tag, field)| read_field(object, tag, field, path));
    let (center, width, intercept, slope) = (center?, width?, intercept?, slope?);

    match CalibrationParams::from_values(&center, &width, &intercept, &slope) {
        Ok(Some(params)) => Ok(params),
        Ok(None) => Err(malformed(path, CALIBRATION_TAGS[0].1, "empty value".into())),
        Err(e) => Err(malformed(path, CALIBRATION_TAGS[1].1, e.to_string())),
    }
}

fn read_field(
    object: &InMemDicomObject,
    tag: Tag,
    field: &'static str,
    path: &Path,
) -> Result<CalibrationValue> {
    let element = object
        .element(tag)
        .map_err(|_| malformed(path, field, "tag not present".into()))?;
    let values = element
        .to_multi_float64()
        .map_err(|e| malformed(path, field, e.to_string()))?;
    CalibrationValue::from_decimals(&values)
        .ok_or_else(|| malformed(path, field, format!("unusable values {values:?}")))
}

fn malformed(path: &Path, field: &'static str, reason: String) -> Error {
    Error::MalformedCalibration {
        path: path.to_path_buf(),
        field,
        reason,
    }
}

fn dicom_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Dicom {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::{dicom_value, DataElement, PrimitiveValue, VR};
    use dicom_object::FileMetaTableBuilder;
    use std::path::PathBuf;

    fn object_with(elements: Vec<DataElement<InMemDicomObject>>) -> InMemDicomObject {
        InMemDicomObject::from_element_iter(elements)
    }

    fn ds(tag: Tag, value: &str) -> DataElement<InMemDicomObject> {
        DataElement::new(tag, VR::DS, PrimitiveValue::from(value))
    }

    /// Writes a signed 16-bit monochrome slice with a brain window and the
    /// usual CT rescale. `frames` holds row-major stored values per frame.
    fn write_slice(path: &Path, rows: u16, cols: u16, frames: &[&[i16]]) {
        let pixels: Vec<u8> = frames
            .iter()
            .flat_map(|frame| frame.iter())
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut elements = vec![
            DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(CT_IMAGE_STORAGE)),
            DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(INSTANCE_UID)),
            DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
            DataElement::new(
                tags::PHOTOMETRIC_INTERPRETATION,
                VR::CS,
                PrimitiveValue::from("MONOCHROME2"),
            ),
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(rows)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(cols)),
            DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16_u16)),
            DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(16_u16)),
            DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(15_u16)),
            DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(1_u16)),
            ds(tags::WINDOW_CENTER, "40"),
            ds(tags::WINDOW_WIDTH, "80"),
            ds(tags::RESCALE_INTERCEPT, "-1024"),
            ds(tags::RESCALE_SLOPE, "1"),
            DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(pixels)),
        ];
        if frames.len() > 1 {
            elements.push(DataElement::new(
                tags::NUMBER_OF_FRAMES,
                VR::IS,
                PrimitiveValue::from(frames.len().to_string()),
            ));
        }
        object_with(elements)
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(INSTANCE_UID),
            )
            .unwrap()
            .write_to_file(path)
            .unwrap();
    }

    const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
    const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
    const INSTANCE_UID: &str = "1.2.826.0.1.3680043.2.1125.1";

    #[test]
    fn test_read_2d_returns_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ID_000000001.dcm");
        write_slice(&path, 2, 3, &[&[-2000, -1024, 0, 40, 1000, 3000]]);

        let (image, calibration) = read_2d(&path).unwrap();
        // Stored values, not rescaled by the -1024 intercept
        assert_eq!(
            image,
            ndarray::array![[-2000.0, -1024.0, 0.0], [40.0, 1000.0, 3000.0]]
        );
        assert_eq!(calibration, CalibrationParams::new(40, 80, -1024, 1).unwrap());
    }

    #[test]
    fn test_read_2d_keeps_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ID_000000002.dcm");
        write_slice(&path, 2, 2, &[&[1, 2, 3, 4], &[-5, -6, -7, -8]]);

        let (image, _) = read_2d(&path).unwrap();
        assert_eq!(image, ndarray::array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_read_2d_missing_file() {
        let result = read_2d("/nonexistent/ID_000000000.dcm");
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_calibration_scalar_fields() {
        let object = object_with(vec![
            ds(tags::WINDOW_CENTER, "40"),
            ds(tags::WINDOW_WIDTH, "80"),
            ds(tags::RESCALE_INTERCEPT, "-1024.0"),
            ds(tags::RESCALE_SLOPE, "1.0"),
        ]);
        let params = calibration_from_object(&object, &PathBuf::from("slice.dcm")).unwrap();
        assert_eq!(params, CalibrationParams::new(40, 80, -1024, 1).unwrap());
    }

    #[test]
    fn test_calibration_multi_value_takes_first() {
        let object = object_with(vec![
            DataElement::new(tags::WINDOW_CENTER, VR::DS, dicom_value!(Strs, ["36", "600"])),
            DataElement::new(tags::WINDOW_WIDTH, VR::DS, dicom_value!(Strs, ["80", "2800"])),
            ds(tags::RESCALE_INTERCEPT, "-1024"),
            ds(tags::RESCALE_SLOPE, "1"),
        ]);
        let params = calibration_from_object(&object, &PathBuf::from("slice.dcm")).unwrap();
        assert_eq!(params.center(), 36);
        assert_eq!(params.width(), 80);
    }

    #[test]
    fn test_calibration_missing_tag() {
        let object = object_with(vec![
            ds(tags::WINDOW_CENTER, "40"),
            ds(tags::RESCALE_INTERCEPT, "-1024"),
            ds(tags::RESCALE_SLOPE, "1"),
        ]);
        let err = calibration_from_object(&object, &PathBuf::from("slice.dcm")).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCalibration { field, .. } if field.starts_with("WindowWidth")
        ));
    }

    #[test]
    fn test_calibration_unparseable_value() {
        let object = object_with(vec![
            ds(tags::WINDOW_CENTER, "forty"),
            ds(tags::WINDOW_WIDTH, "80"),
            ds(tags::RESCALE_INTERCEPT, "-1024"),
            ds(tags::RESCALE_SLOPE, "1"),
        ]);
        let err = calibration_from_object(&object, &PathBuf::from("slice.dcm")).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedCalibration { field, .. } if field.starts_with("WindowCenter")
        ));
    }

    #[test]
    fn test_calibration_zero_width() {
        let object = object_with(vec![
            ds(tags::WINDOW_CENTER, "40"),
            ds(tags::WINDOW_WIDTH, "0"),
            ds(tags::RESCALE_INTERCEPT, "0"),
            ds(tags::RESCALE_SLOPE, "1"),
        ]);
        let result = calibration_from_object(&object, &PathBuf::from("slice.dcm"));
        assert!(matches!(result, Err(Error::MalformedCalibration { .. })));
    }
}
